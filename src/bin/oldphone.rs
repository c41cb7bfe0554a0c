use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use phone_engine::input::{self, validate_line, Symbol};
use phone_engine::keymap;
use phone_engine::settings::{self, settings};
use phone_engine::{
    Decoder, DecoderEvent, JournalStore, KeyMap, PhoneSession, RegistryConfig, SessionRegistry,
    Subscription,
};

#[derive(Parser)]
#[command(name = "oldphone", about = "Old-phone keypad decoder")]
struct Cli {
    /// Settings TOML (idle timeout, journal path)
    #[arg(long, global = true)]
    config: Option<String>,
    /// Keypad layout TOML replacing the standard one
    #[arg(long, global = true)]
    keymap: Option<String>,
    /// Directory for JSON trace logs (only with the `trace` feature)
    #[arg(long, global = true)]
    trace_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a recorded key stream, e.g. "4433555 555666#"
    Decode {
        /// Keys; space is a pause, `*` deletes, `#` ends the input
        input: String,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the interactive keypad console
    Interactive {
        /// Session id used for the console session
        #[arg(long, default_value = "console")]
        session: String,
    },

    /// Print the standard keypad layout as TOML
    Keymap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Each line is a recorded stream.
    String,
    /// Each character is a live key press; pauses come from the idle timer.
    SingleKey,
}

fn read_file(kind: &str, path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {} file {}: {}", kind, path, e);
        process::exit(1);
    })
}

fn load_config(cli: &Cli) {
    if let Some(ref path) = cli.config {
        settings::init_custom(read_file("settings", path)).unwrap_or_else(|e| {
            eprintln!("Invalid settings in {}: {}", path, e);
            process::exit(1);
        });
    }
    if let Some(ref path) = cli.keymap {
        KeyMap::init_custom(read_file("keymap", path)).unwrap_or_else(|e| {
            eprintln!("Invalid keymap in {}: {}", path, e);
            process::exit(1);
        });
    }
    if let Some(ref dir) = cli.trace_dir {
        phone_engine::trace_init::init_tracing(Path::new(dir));
    }
}

fn build_registry() -> SessionRegistry {
    let registry = SessionRegistry::new(RegistryConfig::from_settings());
    match settings().store.journal {
        Some(ref path) => registry.with_store(Arc::new(JournalStore::new(Path::new(path)))),
        None => registry,
    }
}

fn print_menu() {
    println!("Old phone keypad");
    println!("  S  single-key mode (each key is pressed live)");
    println!("  O  string mode (each line is decoded as a whole)");
    println!("  M  show this menu");
    println!("  Q  quit");
    println!("Keys: 0-9 letters, space pause, * backspace, # send");
}

fn print_events(sub: &Subscription) {
    for event in sub.events.try_iter() {
        match event {
            DecoderEvent::TextChanged(text) => println!("Text: {}", text),
            DecoderEvent::TextCompleted(text) => println!("Final output: {}", text),
        }
    }
}

fn press(session: &PhoneSession, c: char) {
    match Symbol::classify(c) {
        Symbol::Key(key) => session.process_key(key),
        Symbol::Backspace => session.process_backspace(),
        Symbol::Complete => session.process_complete(),
        // The real idle timer commits the cycle in this mode
        Symbol::Pause => {}
    }
}

fn run_interactive(session_id: &str) {
    let registry = build_registry();
    let session = registry.get_or_create(session_id);
    let sub = session.subscribe();
    let mut mode = Mode::String;

    print_menu();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("[{}] > ", if mode == Mode::String { "string" } else { "key" });
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Failed to read input: {}", e);
                registry.shutdown();
                process::exit(1);
            }
            None => break,
        };
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = validate_line(line) {
            eprintln!("Invalid input: {}", e);
            continue;
        }

        let trimmed = line.trim();
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(command) = input::Command::parse(c) {
                match command {
                    input::Command::SingleKeyMode => mode = Mode::SingleKey,
                    input::Command::StringMode => mode = Mode::String,
                    input::Command::Menu => print_menu(),
                    input::Command::Quit => break,
                }
                continue;
            }
        }

        match mode {
            Mode::String => {
                // Command letters inside a line are not keys
                let keys: String = line
                    .chars()
                    .filter(|c| input::Command::parse(*c).is_none())
                    .collect();
                session.decode(&keys);
            }
            Mode::SingleKey => {
                for c in line.chars() {
                    match input::Command::parse(c) {
                        Some(input::Command::Quit) => {
                            print_events(&sub);
                            registry.shutdown();
                            println!("Goodbye");
                            return;
                        }
                        Some(input::Command::StringMode) => mode = Mode::String,
                        Some(input::Command::Menu) => print_menu(),
                        Some(input::Command::SingleKeyMode) => {}
                        None => press(&session, c),
                    }
                }
            }
        }
        print_events(&sub);
    }

    print_events(&sub);
    registry.shutdown();
    println!("Goodbye");
}

fn main() {
    let cli = Cli::parse();
    load_config(&cli);

    match cli.command {
        Command::Decode { input, json } => {
            let output = Decoder::new(KeyMap::global()).decode(&input);
            if json {
                let value = serde_json::json!({ "input": input, "output": output });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&value).expect("JSON serialization failed")
                );
            } else {
                println!("{}", output);
            }
        }

        Command::Interactive { session } => run_interactive(&session),

        Command::Keymap => print!("{}", keymap::default_toml()),
    }
}
