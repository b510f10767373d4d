//! Dynamic Template CLI
//!
//! Usage:
//!   dynamic-template [OPTIONS]
//!
//! Options:
//!   -t, --template <TEXT>        Inline template text
//!   -p, --path <FILE>            Template file
//!   -u, --url <URL>              Remote template URL
//!   -c, --config <FILE>          Configuration file (TOML format)
//!       --set <KEY=VALUE>        Context property (repeatable)
//!   -v, --verbose                Log each build step
//!   -h, --help                   Print help

use std::fs;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use clap::Parser;

use dynamic_template::{
    Context, DynamicBase, DynamicConfig, DynamicError, DynamicInputs, HostServices,
    MarkupCompiler, MemoryViewContainer, ModuleRef, ReqwestClient, StaticModuleLoader, Value,
};

#[derive(Parser)]
#[command(name = "dynamic-template")]
#[command(about = "Compile and render a template at runtime")]
struct Cli {
    /// Inline template text
    #[arg(short, long)]
    template: Option<String>,

    /// Template file, resolved against --base-dir
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Remote template URL
    #[arg(short, long)]
    url: Option<String>,

    /// Configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory that template paths are relative to
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Context property as key=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Style text attached to the component (repeatable)
    #[arg(long = "style")]
    styles: Vec<String>,

    /// Extra module imported by the component (repeatable)
    #[arg(long = "module")]
    modules: Vec<String>,

    /// Lazy module to load before compiling, as path#Export (repeatable)
    #[arg(long = "lazy-module")]
    lazy_modules: Vec<String>,

    /// Template used when fetching --url fails
    #[arg(long)]
    default_template: Option<String>,

    /// Stop after this many redirects
    #[arg(long)]
    max_redirects: Option<usize>,

    /// Log each build step
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => match DynamicConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => DynamicConfig::default(),
    };

    let inputs = match apply_cli(config.to_inputs(), &cli) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    if inputs.template.is_none() && inputs.template_path.is_none() && inputs.template_url.is_none()
    {
        eprintln!("Error: no template given; use --template, --path, --url or --config");
        process::exit(2);
    }

    let http = match ReqwestClient::new() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let compiler = match &cli.base_dir {
        Some(dir) => MarkupCompiler::with_base_path(dir.clone()),
        None => MarkupCompiler::new(),
    };
    let base_dir = cli.base_dir.clone();

    let services = HostServices::new(
        Rc::new(compiler),
        Rc::new(StaticModuleLoader::permissive()),
        Rc::new(http),
    )
    .with_static_modules(config.static_modules());
    let container = Rc::new(MemoryViewContainer::new());
    let dynamic =
        DynamicBase::with_selector_prefix(services, container.clone(), config.selector_prefix());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            process::exit(1);
        }
    };

    match runtime.block_on(dynamic.on_changes(inputs.clone())) {
        Ok(_) => {
            println!("{}", container.render());
        }
        Err(DynamicError::Compile(e)) => {
            match template_source(&inputs, base_dir.as_ref()) {
                Some((source, name)) => eprint!("{}", e.format(&source, &name)),
                None => eprintln!("Error: {}", e),
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Layer command-line options over the configured inputs
///
/// A template source given on the command line replaces every configured
/// source, so it wins regardless of source priority.
fn apply_cli(mut inputs: DynamicInputs, cli: &Cli) -> Result<DynamicInputs, String> {
    if cli.template.is_some() || cli.path.is_some() || cli.url.is_some() {
        inputs.template = cli.template.clone();
        inputs.template_path = cli.path.clone();
        inputs.template_url = cli.url.clone();
    }
    if let Some(default) = &cli.default_template {
        inputs.default_template = Some(default.clone());
    }
    if let Some(limit) = cli.max_redirects {
        inputs.max_redirects = Some(limit);
    }
    inputs.styles.extend(cli.styles.iter().cloned());
    inputs.modules.extend(cli.modules.iter().map(ModuleRef::new));
    inputs.lazy_modules.extend(cli.lazy_modules.iter().cloned());

    if !cli.set.is_empty() {
        let context = inputs.context.get_or_insert_with(Context::new);
        for assignment in &cli.set {
            let (key, value) = parse_assignment(assignment)?;
            context.set(key, value);
        }
    }

    Ok(inputs)
}

/// Parse `key=value`; finite numbers and booleans keep their type
fn parse_assignment(assignment: &str) -> Result<(String, Value), String> {
    let Some((key, raw)) = assignment.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got '{}'", assignment));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", assignment));
    }

    let value = if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::String(raw.to_string()),
        }
    };
    Ok((key.to_string(), value))
}

/// Template text and display name for error reports, when it is local
fn template_source(inputs: &DynamicInputs, base_dir: Option<&PathBuf>) -> Option<(String, String)> {
    if let Some(template) = &inputs.template {
        return Some((template.clone(), "<template>".to_string()));
    }
    let path = inputs.template_path.as_ref()?;
    let full_path = match base_dir {
        Some(dir) => dir.join(path),
        None => path.clone(),
    };
    let source = fs::read_to_string(&full_path).ok()?;
    Some((source, full_path.display().to_string()))
}
