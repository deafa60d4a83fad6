use std::io::{self, Write};
use std::panic;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::MakeWriter;

use crossterm::{
    execute,
    cursor::MoveToColumn,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use gridview::app::App;
use gridview::config::GridConfig;
use gridview::fileio::FileIO;
use gridview::style::{Style, Theme};

struct Args {
    file_path: PathBuf,
    config_path: Option<PathBuf>,
    theme: Option<String>,
    delimiter: Option<u8>,
}

/// Parse command line arguments
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut file_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut theme: Option<String> = None;
    let mut delimiter: Option<u8> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--delimiter" | "-c" | "--config" | "-t" | "--theme" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: {} requires an argument", args[i]);
                    std::process::exit(1);
                };
                match args[i].as_str() {
                    "-d" | "--delimiter" => delimiter = parse_delimiter(value),
                    "-c" | "--config" => config_path = Some(PathBuf::from(value)),
                    _ => theme = Some(value.clone()),
                }
                i += 2;
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                std::process::exit(1);
            }
            _ => {
                file_path = Some(PathBuf::from(&args[i]));
                i += 1;
            }
        }
    }

    let Some(file_path) = file_path else {
        print_help();
        std::process::exit(1);
    };
    Args { file_path, config_path, theme, delimiter }
}

/// Parse a delimiter string into a byte
fn parse_delimiter(s: &str) -> Option<u8> {
    match s.to_lowercase().as_str() {
        "comma" | "," => Some(b','),
        "tab" | "\\t" | "\t" => Some(b'\t'),
        "semicolon" | ";" => Some(b';'),
        "pipe" | "|" => Some(b'|'),
        _ if s.len() == 1 => Some(s.as_bytes()[0]),
        _ => {
            eprintln!("Invalid delimiter: '{}'. Use comma, tab, semicolon, pipe, or a single character.", s);
            std::process::exit(1);
        }
    }
}

/// Restore the terminal before the default panic output
fn install_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);

        if let Some(location) = info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                "panic occurred"
            );
        } else {
            error!("panic occurred");
        }

        if let Some(s) = info.payload().downcast_ref::<&str>() {
            error!(message = %s);
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            error!(message = %s);
        }

        default_hook(info);
    }));
}

/// A `MakeWriter` for `tracing` that logs to the **main screen** by leaving the alternate screen temporarily.
pub struct MainScreenWriter;

impl<'a> MakeWriter<'a> for MainScreenWriter {
    type Writer = MainScreenWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        MainScreenWriterHandle
    }
}

/// A handle that writes to stdout outside the alternate screen
pub struct MainScreenWriterHandle;

impl Write for MainScreenWriterHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        execute!(io::stdout(), LeaveAlternateScreen)?;
        println!();
        execute!(io::stdout(), MoveToColumn(0))?;
        let result = io::stdout().write(buf);
        execute!(io::stdout(), MoveToColumn(0))?;
        io::stdout().flush()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

fn print_help() {
    eprintln!("gridview - A virtualized terminal table viewer with sorting, filtering and footers");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    gridview [OPTIONS] <FILE>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config <PATH>      Grid settings (TOML)");
    eprintln!("    -t, --theme <THEME>      Built-in theme (light, dark) or a theme file");
    eprintln!("    -d, --delimiter <DELIM>  Set the field delimiter (comma, tab, semicolon, pipe, or char)");
    eprintln!("    -h, --help               Print this help message");
    eprintln!();
    eprintln!("KEYS:");
    eprintln!("    j/k h/l      Move row highlight / column cursor");
    eprintln!("    s S          Sort cursor column / add it to a multi-column sort");
    eprintln!("    = !          Keep / drop rows matching the highlighted cell");
    eprintln!("    c C          Clear column filter / all filters");
    eprintln!("    f r          Cycle footer reducers / toggle row count");
    eprintln!("    p [ ]        Toggle pagination / previous and next page");
    eprintln!("    w W #        Toggle wrap / wrap on cursor column / row numbers");
    eprintln!("    + - 0        Widen / narrow / reset cursor column");
    eprintln!("    Enter E      Expand nested rows / collapse all");
    eprintln!("    q            Quit");
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt().with_writer(MainScreenWriter).init();
    info!("gridview started");

    install_panic_hook();

    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => GridConfig::from_file(path).map_err(|e| {
            error!(error = %e, "Failed to load config");
            io::Error::other(e)
        })?,
        None => GridConfig::default(),
    };

    let theme = match args.theme.as_deref().or(config.theme.as_deref()) {
        Some(name) => Theme::resolve(name).unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to the light theme");
            Theme::light()
        }),
        None => Theme::default(),
    };

    let file_io = FileIO::new(args.file_path, args.delimiter);
    let load_result = file_io.load_frame().map_err(|e| {
        error!(error = %e, "Failed to load data");
        io::Error::other(e)
    })?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&config, Style::with_theme(theme), load_result.frame, file_io.file_name());
    if !load_result.warnings.is_empty() {
        app.message = Some(load_result.warnings.join("; "));
    }

    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}
