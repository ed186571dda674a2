mod app;
mod assets;
mod catalog;
mod config;
mod render;
mod scene;
mod ui;

fn main() {
    if let Err(err) = app::run() {
        log::error!("{err}");
        eprintln!("dollhouse: {err}");
        std::process::exit(1);
    }
}
