use std::env;
use std::process::ExitCode;

use person_watch::app;
use person_watch::config::Config;

const CONFIG_PATH: &str = "config.toml";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let config = Config::load_or_default(CONFIG_PATH);

    let model_path = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| config.model.path.clone());
    let camera_index = match args.get(2) {
        Some(raw) => match raw.parse::<i32>() {
            Ok(index) => index,
            Err(_) => {
                eprintln!("invalid camera index: {raw}");
                eprintln!("usage: person-watch [model_path] [camera_index]");
                return ExitCode::from(1);
            }
        },
        None => config.camera.index,
    };

    println!("person-watch {}", env!("GIT_VERSION"));

    match app::run(&config, &model_path, camera_index) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
