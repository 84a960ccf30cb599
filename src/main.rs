use std::path::PathBuf;

fn main() {
    let env = env_logger::Env::default().default_filter_or("lightgun_lib=info");
    env_logger::Builder::from_env(env).init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    if let Err(e) = lightgun_lib::console::run(config_path.as_deref()) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
