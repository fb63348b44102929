use std::fs::File;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::debug;
use topo_map::{
    contour::plan_levels,
    error::{Result, TopoError},
    i18n::{Language, Translations},
    params::{read_params_json, MapParams, PARAM_KEYS},
    render::{format_level, text::find_font},
    scale::ScaleFit,
    session::Session,
    settings::Settings,
};

/// Draws contour maps at a given scale from tab-separated survey points.
#[derive(Parser)]
#[command(name = "topo_map_cli", version)]
struct Cli {
    /// Settings file holding the interface language
    #[arg(long, global = true, default_value = "topo_map_settings.txt")]
    settings: PathBuf,
    /// Translation table with `key;English;French` rows
    #[arg(long, global = true)]
    translations: Option<PathBuf>,
    /// TrueType font used for labels
    #[arg(long, global = true)]
    font: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// Map parameters given on the command line. Unset flags keep the values
/// from `--params` or the defaults.
#[derive(Args, Clone, Default)]
struct MapArgs {
    /// JSON file with map parameters
    #[arg(long)]
    params: Option<PathBuf>,
    /// Scale denominator (200 for 1:200)
    #[arg(long)]
    scale: Option<f64>,
    /// Output resolution: 100, 150 or 300
    #[arg(long)]
    dpi: Option<u32>,
    /// Label every point with `PN <id>`
    #[arg(long)]
    show_ids: bool,
    #[arg(long)]
    font_size: Option<f64>,
    /// Interpolation grid columns
    #[arg(long)]
    nx: Option<usize>,
    /// Interpolation grid rows
    #[arg(long)]
    ny: Option<usize>,
    #[arg(long, allow_hyphen_values = true)]
    base_level: Option<f64>,
    /// Contour interval in metres
    #[arg(long)]
    step: Option<f64>,
    /// Margin around the data in metres
    #[arg(long)]
    extension: Option<f64>,
    /// `linear` or `nearest`
    #[arg(long)]
    method: Option<String>,
}

impl MapArgs {
    fn to_params(&self) -> Result<MapParams> {
        let mut params = match &self.params {
            Some(path) => read_params_json(path)?,
            None => MapParams::default(),
        };
        let overrides = [
            ("scale", self.scale.map(|v| v.to_string())),
            ("dpi", self.dpi.map(|v| v.to_string())),
            ("font_size", self.font_size.map(|v| v.to_string())),
            ("nx", self.nx.map(|v| v.to_string())),
            ("ny", self.ny.map(|v| v.to_string())),
            ("base_level", self.base_level.map(|v| v.to_string())),
            ("step", self.step.map(|v| v.to_string())),
            ("extension", self.extension.map(|v| v.to_string())),
            ("method", self.method.clone()),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                params.set(key, &value)?;
            }
        }
        if self.show_ids {
            params.set("show_ids", "yes")?;
        }
        Ok(params)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load a survey file, draw its contour map and save it as PNG.
    Map {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        args: MapArgs,
    },
    /// Print the contour levels planned for an elevation range.
    Levels {
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        base: f64,
        #[arg(long)]
        step: f64,
        #[arg(long, allow_hyphen_values = true)]
        min: f64,
        #[arg(long, allow_hyphen_values = true)]
        max: f64,
    },
    /// Store the interface language (`en` or `fr`) in the settings file.
    SetLanguage { code: String },
    /// Read commands from standard input.
    Shell {
        #[command(flatten)]
        args: MapArgs,
    },
}

fn init_logging() {
    if let Ok(path) = std::env::var("TOPO_MAP_LOG") {
        match File::create(&path) {
            Ok(file) => {
                env_logger::Builder::from_default_env()
                    .target(env_logger::Target::Pipe(Box::new(file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Failed to create log file {}: {}", path, e);
                env_logger::Builder::from_default_env().init();
            }
        }
    } else {
        env_logger::Builder::from_default_env().init();
    }
}

fn load_translations(path: Option<&Path>, language: Language) -> Result<Translations> {
    match path {
        Some(path) => Translations::load(path, language),
        None => Ok(Translations::builtin(language)),
    }
}

fn report(tr: &Translations, err: &TopoError) {
    eprintln!("{}: {}", tr.tr(err.message_key()), err);
}

fn print_fit(tr: &Translations, fit: &ScaleFit) {
    let (x, y) = fit.initial_scale();
    println!("{}: x = {x:.6}, y = {y:.6}", tr.tr("msg.initial_scale"));
    println!(
        "{}: width = {:.4}, height = {:.4}",
        tr.tr("msg.resize_ratio"),
        fit.ratio.0,
        fit.ratio.1
    );
}

fn join_levels(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_level(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_levels(tr: &Translations, base: f64, step: f64, min: f64, max: f64) -> Result<()> {
    let levels = plan_levels(base, step, min, max)?;
    println!("{}: {}", tr.tr("msg.levels"), join_levels(&levels.ascending()));
    println!("below: {}", join_levels(&levels.below));
    println!("above: {}", join_levels(&levels.above));
    Ok(())
}

fn run_map(session: &mut Session, tr: &Translations, input: &Path, output: &Path) -> Result<()> {
    session.load(input)?;
    println!(
        "{}: {} points, {} buildings",
        tr.tr("msg.loaded"),
        session.store().len(),
        session.store().buildings().len()
    );
    let map = session.draw()?;
    println!(
        "{}: {} contour lines",
        tr.tr("msg.drawn"),
        map.layers.contours.len()
    );
    let fit = session.save(output)?;
    print_fit(tr, &fit);
    println!(
        "{} {} (1:{}, {:.1} x {:.1} cm)",
        tr.tr("msg.saved"),
        output.display(),
        session.params.scale,
        fit.target_cm.0,
        fit.target_cm.1
    );
    Ok(())
}

fn switch_language(
    settings: &mut Settings,
    settings_path: &Path,
    tr: &mut Translations,
    code: &str,
) -> Result<()> {
    let language: Language = code.parse()?;
    settings.set_language(language);
    settings.save(settings_path)?;
    tr.set_language(language);
    println!("{} {}", tr.tr("msg.language"), language);
    Ok(())
}

/// Handles one shell line. Returns `Ok(false)` when the shell should stop.
fn shell_command(
    words: &[String],
    session: &mut Session,
    settings: &mut Settings,
    settings_path: &Path,
    tr: &mut Translations,
) -> Result<bool> {
    let Some((cmd, rest)) = words.split_first() else {
        return Ok(true);
    };
    match (cmd.as_str(), rest) {
        ("quit" | "exit", _) => return Ok(false),
        ("help", _) => println!("{}", tr.tr("msg.help")),
        ("load", [path]) => {
            session.load(Path::new(path))?;
            println!(
                "{}: {} points, {} buildings",
                tr.tr("msg.loaded"),
                session.store().len(),
                session.store().buildings().len()
            );
        }
        ("set", [key, value]) => {
            session.params.set(key, value)?;
            if let Some(v) = session.params.get(key) {
                println!("{key} = {v}");
            }
        }
        ("params", []) => {
            for key in PARAM_KEYS {
                if let Some(v) = session.params.get(key) {
                    println!("{key} = {v}");
                }
            }
        }
        ("draw", []) => {
            let map = session.draw()?;
            println!(
                "{}: {} contour lines",
                tr.tr("msg.drawn"),
                map.layers.contours.len()
            );
        }
        ("save", [path]) => {
            let fit = session.save(Path::new(path))?;
            print_fit(tr, &fit);
            println!("{} {}", tr.tr("msg.saved"), path);
        }
        ("lang", [code]) => switch_language(settings, settings_path, tr, code)?,
        _ => println!("{}: {}", tr.tr("msg.unknown_command"), words.join(" ")),
    }
    Ok(true)
}

fn run_shell(
    session: &mut Session,
    settings: &mut Settings,
    settings_path: &Path,
    tr: &mut Translations,
) {
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("> ");
            let _ = std::io::stdout().flush();
        }
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
            None => break,
        };
        let words = match shell_words::split(&line) {
            Ok(words) => words,
            Err(e) => {
                eprintln!("{}: {}", tr.tr("msg.unknown_command"), e);
                continue;
            }
        };
        debug!("shell command {words:?}");
        match shell_command(&words, session, settings, settings_path, tr) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => report(tr, &e),
        }
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.settings).unwrap_or_else(|e| {
        report(&Translations::default(), &e);
        Settings::default()
    });
    let mut tr = match load_translations(cli.translations.as_deref(), settings.language()) {
        Ok(tr) => tr,
        Err(e) => {
            report(&Translations::builtin(settings.language()), &e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Levels {
            base,
            step,
            min,
            max,
        } => print_levels(&tr, base, step, min, max),
        Commands::SetLanguage { code } => {
            switch_language(&mut settings, &cli.settings, &mut tr, &code)
        }
        Commands::Map {
            input,
            output,
            args,
        } => args.to_params().and_then(|params| {
            let font = find_font(cli.font.as_deref())?;
            let mut session = Session::new(params).with_font(font);
            run_map(&mut session, &tr, &input, &output)
        }),
        Commands::Shell { args } => args.to_params().and_then(|params| {
            let font = find_font(cli.font.as_deref())?;
            let mut session = Session::new(params).with_font(font);
            run_shell(&mut session, &mut settings, &cli.settings, &mut tr);
            Ok(())
        }),
    };
    if let Err(e) = result {
        report(&tr, &e);
        std::process::exit(1);
    }
}
