use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::Parser;

use webmonitor::{
    cli::{Cli, OutputFormat},
    config::MonitorConfig,
    ui::{restore_terminal, setup_terminal, TuiApp},
    AppEvent, ChangeRecord, ElapsedTimer, KindColor, WatchController,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();
    let config = cli.resolve_config()?;

    match cli.output {
        OutputFormat::Tui => run_tui_mode(&cli, &config)?,
        format => run_stream_mode(&cli, &config, format)?,
    }

    Ok(())
}

fn run_tui_mode(cli: &Cli, config: &MonitorConfig) -> Result<()> {
    let app = TuiApp::new(config, cli.path.clone());

    // Setup terminal
    let mut terminal = setup_terminal()?;

    // Run the application
    let res = app.run(&mut terminal);

    // Restore terminal
    if let Err(err) = restore_terminal(&mut terminal) {
        eprintln!("Failed to restore terminal: {}", err);
    }

    if let Err(err) = res {
        eprintln!("Application error: {}", err);
        std::process::exit(1);
    }

    Ok(())
}

/// Print records to stdout until Ctrl+C.
fn run_stream_mode(cli: &Cli, config: &MonitorConfig, format: OutputFormat) -> Result<()> {
    let path = cli
        .watch_path()
        .context("A directory to watch is required")?;

    let controller = WatchController::from_config(config);
    let (tx, events) = mpsc::channel();
    controller.log().subscribe(tx.clone());
    let timer = ElapsedTimer::start(config.ui.tick_period());

    let session = controller
        .start(path, config.watcher.recursive)
        .with_context(|| format!("Failed to watch {}", path.display()))?;

    if format == OutputFormat::Text {
        println!("Watching: {}", session.root_path.display());
        println!("Press Ctrl+C to quit");
        println!("---");
    }

    ctrlc::set_handler(move || {
        let _ = tx.send(AppEvent::Quit);
    })?;

    while let Ok(event) = events.recv() {
        match event {
            AppEvent::RecordAppended(record) => match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&record)?),
                OutputFormat::Compact => print_compact_record(&record),
                _ => print_text_record(&record, config.ui.no_color),
            },
            AppEvent::Quit => break,
            _ => continue, // Ignore other events
        }
    }

    controller.stop()?;
    tracing::info!(
        "Logged {} changes in {}",
        controller.log().len(),
        timer.formatted()
    );

    Ok(())
}

fn print_text_record(record: &ChangeRecord, no_color: bool) {
    let line = format!(
        "[#{} {}] {} {}  {}",
        record.sequence,
        record.display_time(),
        record.label,
        record.file_name,
        record.full_path.display()
    );

    if no_color {
        println!("{}", line);
        return;
    }

    let color = match record.kind.color() {
        KindColor::Green => "\x1b[32m",
        KindColor::Red => "\x1b[31m",
        KindColor::Orange => "\x1b[33m",
        KindColor::Gray => "\x1b[90m",
        KindColor::Default => "",
    };
    if color.is_empty() {
        println!("{}", line);
    } else {
        println!("{}{}\x1b[0m", color, line);
    }
}

fn print_compact_record(record: &ChangeRecord) {
    println!("{} {}", record.kind.code(), record.file_name);
}
