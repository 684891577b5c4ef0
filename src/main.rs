use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use portfolio_gallery::store::ImageTemplate;
use portfolio_gallery::{
    logging, open_backend, AdminGate, Config, GalleryStore, GalleryView, ImageInput,
    Notification, StoreOptions, UploadFile,
};

enum Command {
    List { category: Option<String> },
    Categories,
    AddCategory { name: String },
    Add {
        url: String,
        category: String,
        title: Option<String>,
        description: Option<String>,
    },
    Upload {
        files: Vec<PathBuf>,
        template: ImageTemplate,
    },
    Remove { id: String },
    Watch { seconds: Option<u64> },
}

impl Command {
    fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Command::List { .. } | Command::Categories | Command::Watch { .. }
        )
    }
}

struct Args {
    config_path: Option<PathBuf>,
    password: Option<String>,
    command: Command,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut password = None;
    let mut title = None;
    let mut description = None;
    let mut category = None;
    let mut seconds = None;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("portfolio-gallery {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            flag @ ("--config" | "-c" | "--password" | "--title" | "--description"
            | "--category" | "--seconds") => {
                let Some(value) = args.get(i + 1).cloned() else {
                    eprintln!("Error: {} requires a value", flag);
                    std::process::exit(1);
                };
                match flag {
                    "--config" | "-c" => config_path = Some(PathBuf::from(value)),
                    "--password" => password = Some(value),
                    "--title" => title = Some(value),
                    "--description" => description = Some(value),
                    "--category" => category = Some(value),
                    _ => match value.parse::<u64>() {
                        Ok(s) => seconds = Some(s),
                        Err(_) => {
                            eprintln!("Error: --seconds expects a number");
                            std::process::exit(1);
                        }
                    },
                }
                i += 1;
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(1);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("list") => Command::List {
            category: positional.next(),
        },
        Some("categories") => Command::Categories,
        Some("add-category") => match positional.next() {
            Some(name) => Command::AddCategory { name },
            None => usage_error("add-category requires NAME"),
        },
        Some("add") => match (positional.next(), positional.next().or(category)) {
            (Some(url), Some(category)) => Command::Add {
                url,
                category,
                title,
                description,
            },
            _ => usage_error("add requires URL and CATEGORY"),
        },
        Some("upload") => {
            let files: Vec<PathBuf> = positional.map(PathBuf::from).collect();
            Command::Upload {
                files,
                template: ImageTemplate {
                    category: category.unwrap_or_default(),
                    title,
                    description,
                },
            }
        }
        Some("remove") => match positional.next() {
            Some(id) => Command::Remove { id },
            None => usage_error("remove requires ID"),
        },
        Some("watch") => Command::Watch { seconds },
        Some(other) => usage_error(&format!("unknown command '{}'", other)),
        None => usage_error("missing command"),
    };

    Args {
        config_path,
        password,
        command,
    }
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn print_help() {
    println!(
        r#"portfolio-gallery - manage the portfolio image gallery

USAGE:
    portfolio-gallery [OPTIONS] <COMMAND>

COMMANDS:
    list [CATEGORY]                 List images, optionally for one category
    categories                      List categories
    add-category NAME               Create a category (admin)
    add URL CATEGORY                Add an image by URL (admin)
        [--title T] [--description D]
    upload FILE... --category C     Upload files and add them (admin)
        [--title T] [--description D]
    remove ID                       Remove an image (admin)
    watch [--seconds N]             Follow realtime changes

OPTIONS:
    --config, -c PATH   Path to config file
    --password PW       Admin password (prompted if omitted)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PORTFOLIO_LOG                 Log level (trace, debug, info, warn, error)
    PORTFOLIO_SUPABASE_URL        Hosted backend URL
    PORTFOLIO_SUPABASE_ANON_KEY   Hosted backend anon key
    PORTFOLIO_ADMIN_PASSWORD      Admin password to accept

Config file location: $XDG_CONFIG_HOME/portfolio-gallery/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    if let Err(e) = logging::init(None) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if args.command.requires_admin() {
        let mut gate = AdminGate::from_config(&config.admin);
        let attempt = match args.password {
            Some(password) => password,
            None => prompt("Admin password: ")?,
        };
        if !gate.login(&attempt) {
            bail!("Access denied: incorrect password");
        }
    }

    let backend = open_backend(&config)?;
    let mut options = StoreOptions::from(&config.realtime);
    options.realtime = matches!(args.command, Command::Watch { .. });

    let mut store = GalleryStore::new(backend, options);
    let report = store.initialize();
    if let Some(e) = &report.subscription {
        eprintln!("warning: {}", e);
    }
    print_notifications(store.take_notifications());

    let result = run(&mut store, args.command);
    print_notifications(store.take_notifications());

    if let Err(e) = store.shutdown() {
        tracing::warn!(error = %e, "Shutdown incomplete");
    }
    result
}

fn run(store: &mut GalleryStore, command: Command) -> Result<()> {
    match command {
        Command::List { category } => {
            let mut view = GalleryView::new();
            if let Some(category) = category {
                view.select_category(&category.trim().to_lowercase());
            }
            for image in view.filtered(store.images()) {
                println!(
                    "{}\t{}\t{}\t{}",
                    image.id, image.category, image.title, image.url
                );
            }
        }
        Command::Categories => {
            for category in store.categories() {
                println!("{}", category);
            }
        }
        Command::AddCategory { name } => {
            if !store.add_category(&name)? {
                println!("Category '{}' already exists", name.trim().to_lowercase());
            }
        }
        Command::Add {
            url,
            category,
            title,
            description,
        } => {
            let mut input = ImageInput::new(url, category);
            input.title = title;
            input.description = description;
            let image = store.add_image(input)?;
            println!("{}", image.id);
        }
        Command::Upload { files, template } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(UploadFile::from_path(path)?);
            }
            let report = store.publish_files(&uploads, &template)?;
            for image in &report.added {
                println!("{}\t{}", image.id, image.url);
            }
            for (name, e) in &report.failed {
                eprintln!("{}: {}", name, e);
            }
            if report.added.is_empty() {
                bail!("No images were added");
            }
        }
        Command::Remove { id } => {
            store.remove_image(&id)?;
        }
        Command::Watch { seconds } => watch(store, seconds),
    }
    Ok(())
}

fn watch(store: &mut GalleryStore, seconds: Option<u64>) {
    println!(
        "Watching {} backend: {} images, {} categories",
        store.backend_name(),
        store.images().len(),
        store.categories().len()
    );

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    while deadline.map_or(true, |d| Instant::now() < d) {
        let applied = store.poll_realtime();
        if applied > 0 {
            println!(
                "{} change(s) applied: {} images, {} categories",
                applied,
                store.images().len(),
                store.categories().len()
            );
        }
        print_notifications(store.take_notifications());
        std::thread::sleep(Duration::from_millis(250));
    }
}

fn print_notifications(notifications: Vec<Notification>) {
    for notification in notifications {
        if notification.is_error() {
            eprintln!("{}: {}", notification.title, notification.message);
        } else {
            println!("{}", notification.message);
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}
