use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use typsubst::compiler::frontend::FIXTURE_DECLARATIONS;
use typsubst::{
    init_dev_logging, init_logging, parse_declarations, parse_substitution, parse_type, BatchSubstitutor, Config, LogConfig,
    Substitutor, SubstitutionCache, Type, TypeContext, TypeRenderer, Variance,
};

const EXIT_ERROR: i32 = 1;
const EXIT_CONFLICT: i32 = 2;

#[derive(Debug, Default)]
struct Args {
    decls: Option<PathBuf>,
    config: Option<PathBuf>,
    batch: Option<PathBuf>,
    ambient: Option<Variance>,
    json: bool,
    verbose_variance: bool,
    metrics: bool,
    debug: bool,
    ty: Option<String>,
    bindings: Vec<String>,
}

impl Args {
    fn from_args() -> Result<Self, String> {
        let argv: Vec<String> = std::env::args().collect();
        let prog = argv.first().map(String::as_str).unwrap_or("typsubst").to_string();
        let mut args = Self::default();
        let mut rest = argv.into_iter().skip(1);

        while let Some(arg) = rest.next() {
            let mut value = |name: &str| rest.next().ok_or_else(|| format!("{} requires a value", name));
            match arg.as_str() {
                "--help" | "-h" => return Err(Self::usage(&prog)),
                "--decls" => args.decls = Some(PathBuf::from(value("--decls")?)),
                "--config" => args.config = Some(PathBuf::from(value("--config")?)),
                "--batch" => args.batch = Some(PathBuf::from(value("--batch")?)),
                "--ambient" => args.ambient = Some(value("--ambient")?.parse()?),
                "--json" => args.json = true,
                "--verbose-variance" => args.verbose_variance = true,
                "--metrics" => args.metrics = true,
                "--debug" => args.debug = true,
                opt if opt.starts_with("--") => {
                    return Err(format!("Unknown option: {}\n\n{}", opt, Self::usage(&prog)))
                }
                binding if binding.contains('=') => args.bindings.push(binding.to_string()),
                positional if args.ty.is_none() => args.ty = Some(positional.to_string()),
                extra => return Err(format!("Unexpected argument: {}", extra)),
            }
        }

        if args.ty.is_none() && args.batch.is_none() {
            return Err(Self::usage(&prog));
        }
        Ok(args)
    }

    fn usage(prog: &str) -> String {
        format!(
            "Typsubst - variance-aware generic type substitution\n\n\
            USAGE:\n    {} [OPTIONS] <TYPE> [PARAM=PROJECTION ...]\n    \
            {} [OPTIONS] --batch <FILE> [PARAM=PROJECTION ...]\n\n\
            OPTIONS:\n    \
            -h, --help            Print help information\n    \
            --decls <FILE>        Read class and parameter declarations from FILE\n    \
            --ambient <VARIANCE>  Variance of the position TYPE is used in (invariant, out, in)\n    \
            --batch <FILE>        Substitute every type in FILE, one per line\n    \
            --config <FILE>       Use FILE instead of the nearest .typsubstrc\n    \
            --json                Print results as JSON\n    \
            --verbose-variance    Print use-site variance even when the declaration implies it\n    \
            --metrics             Print counters and timings to stderr\n    \
            --debug               Trace every substitution to stderr, ignoring [logging]\n\n\
            EXAMPLES:\n    \
            {} 'C<T>' 'T=out String'\n    \
            {} --ambient in 'T?' 'T=in String'",
            prog, prog, prog, prog
        )
    }
}

#[derive(Debug, Serialize)]
struct Report {
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflict: Option<String>,
}

fn load_context(decls: Option<&PathBuf>) -> Result<TypeContext, String> {
    let ctx = TypeContext::new();
    let (source, origin) = match decls {
        Some(path) => (
            fs::read_to_string(path).map_err(|e| format!("Error reading {}: {}", path.display(), e))?,
            path.display().to_string(),
        ),
        None => (FIXTURE_DECLARATIONS.to_string(), "<builtin>".to_string()),
    };
    let count = parse_declarations(&ctx, &source).map_err(|e| format!("{}:{}", origin, e))?;
    debug!(origin = %origin, count, "declarations loaded");
    Ok(ctx)
}

fn read_batch(ctx: &TypeContext, path: &PathBuf) -> Result<Vec<(String, Type)>, String> {
    let source = fs::read_to_string(path).map_err(|e| format!("Error reading {}: {}", path.display(), e))?;
    source
        .lines()
        .enumerate()
        .map(|(index, line)| (index, line.split("//").next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(index, line)| {
            parse_type(ctx, line)
                .map(|ty| (line.to_string(), ty))
                .map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))
        })
        .collect()
}

fn run(args: Args) -> Result<i32, String> {
    let config = match &args.config {
        Some(path) => Config::load(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => Config::discover(),
    };
    let _guard = if args.debug {
        init_dev_logging()
    } else {
        init_logging(LogConfig::from_settings(&config.logging))
    };
    info!("typsubst starting");

    let ambient = args.ambient.unwrap_or(config.substitution.ambient);
    let renderer = TypeRenderer {
        show_redundant_variance: args.verbose_variance || config.substitution.show_redundant_variance,
    };

    let ctx = load_context(args.decls.as_ref())?;
    let map = parse_substitution(&ctx, &args.bindings).map_err(|e| format!("binding {}", e))?;
    debug!(bindings = map.len(), %ambient, "substitution map built");

    let mut inputs = Vec::new();
    if let Some(source) = &args.ty {
        let ty = parse_type(&ctx, source).map_err(|e| format!("type {}", e))?;
        inputs.push((source.clone(), ty));
    }
    if let Some(path) = &args.batch {
        inputs.extend(read_batch(&ctx, path)?);
    }

    let mut batch = BatchSubstitutor::new(Substitutor::new(map))
        .with_ambient(ambient)
        .with_workers(config.batch.workers.unwrap_or(0))
        .map_err(|e| format!("Failed to start workers: {}", e))?;
    if config.batch.memoize {
        batch = batch.with_cache(Arc::new(SubstitutionCache::new()));
    }

    let types: Vec<Type> = inputs.iter().map(|(_, ty)| ty.clone()).collect();
    let results = batch.substitute_all(&types);

    let reports: Vec<Report> = inputs
        .into_iter()
        .zip(results)
        .map(|((input, _), result)| match result {
            Ok(ty) => Report { input, result: Some(renderer.render(&ty)), conflict: None },
            Err(conflict) => Report { input, result: None, conflict: Some(conflict.to_string()) },
        })
        .collect();
    let conflicts = reports.iter().filter(|r| r.conflict.is_some()).count();

    if args.json {
        let json = if args.batch.is_some() {
            serde_json::to_string_pretty(&reports)
        } else {
            serde_json::to_string_pretty(&reports[0])
        };
        println!("{}", json.map_err(|e| format!("Failed to serialize report: {}", e))?);
    } else {
        let prefix_input = reports.len() > 1;
        for report in &reports {
            let line = match (&report.result, &report.conflict) {
                (Some(result), _) => result.clone(),
                (None, Some(conflict)) => format!("conflict: {}", conflict),
                (None, None) => continue,
            };
            if prefix_input {
                println!("{} => {}", report.input, line);
            } else {
                println!("{}", line);
            }
        }
    }

    if args.metrics {
        eprintln!("{}", batch.metrics().summary().report());
    }

    if conflicts > 0 {
        info!(conflicts, "substitution finished with conflicts");
        Ok(EXIT_CONFLICT)
    } else {
        info!(count = reports.len(), "substitution finished");
        Ok(0)
    }
}

fn main() {
    let args = match Args::from_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(EXIT_ERROR);
        }
    };

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "typsubst failed");
            eprintln!("{}", e);
            std::process::exit(EXIT_ERROR);
        }
    }
}
