//! Application entry point

use std::io;
use std::sync::Arc;

mod client;
mod config;
mod controller;
mod heatmap;
mod map;
mod theme;
mod ui;

/// Restore terminal to normal mode.
fn cleanup_terminal() {
    use std::io::Write;
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    );
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

/// Install panic hook to restore terminal before printing error.
fn setup_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        cleanup_terminal();
        eprintln!("Application panicked!");
        if let Some(location) = panic_info.location() {
            eprintln!("Location: {}", location);
        }
        original_hook(panic_info);
    }));
}

/// Logs go to a file: stdout and stderr belong to the terminal UI.
fn init_logging() {
    let dir = config::cache_dir();
    let file = std::fs::create_dir_all(&dir)
        .and_then(|_| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("heatmap.log"))
        });

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match file {
        Ok(f) => {
            builder.target(env_logger::Target::Pipe(Box::new(f)));
        }
        Err(_) => {
            // Nowhere safe to write while the UI is up
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}

/// Drain pending input events so stray mouse reports don't leak into the shell.
fn drain_input_events(silence: std::time::Duration) {
    use crossterm::event::{poll, read};
    while poll(silence).unwrap_or(false) {
        let _ = read();
    }
}

/// Flush OS-level terminal input buffer.
#[cfg(unix)]
fn flush_stdin_buffer() {
    use std::os::unix::io::AsRawFd;
    unsafe {
        libc::tcflush(std::io::stdin().as_raw_fd(), libc::TCIFLUSH);
    }
}

#[cfg(not(unix))]
fn flush_stdin_buffer() {}

fn main() -> io::Result<()> {
    init_logging();

    let config = match config::Config::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("airline-heatmap-tui: {}", e);
            std::process::exit(2);
        }
    };
    log::info!(
        "Starting against {} (airline {:?}, rival {:?})",
        config.base_url,
        config.airline_id,
        config.rival_airline_id
    );

    let source = Arc::new(client::HttpHeatmapSource::new(
        &config.base_url,
        config.request_timeout(),
    ));
    let controller =
        controller::HeatmapController::new(source, map::WorldMap::new(), config.airline_context());

    setup_panic_hook();
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    crossterm::terminal::enable_raw_mode()?;

    let backend = ratatui::backend::CrosstermBackend::new(std::io::stdout());
    let mut terminal = ratatui::Terminal::new(backend)?;

    let result = ui::App::new(controller).run(&mut terminal);

    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
    drain_input_events(std::time::Duration::from_millis(50));
    flush_stdin_buffer();
    cleanup_terminal();

    if let Err(e) = &result {
        log::error!("Terminal error: {}", e);
    }
    result
}
