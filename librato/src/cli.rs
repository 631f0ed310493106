use anyhow::{Context, Result, format_err};
use clap::ArgMatches;
use librato_client::{
    Annotation, AnnotationLink, ClientEvent, Librato, MeasurementOptions, UnixTimestamp,
};
use librato_config::{Config, OverridableConfig};

use crate::cliapp::make_app;
use crate::setup;

/// Extracts config overrides from parsed command line arguments.
fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    OverridableConfig {
        email: matches.get_one::<String>("email").cloned(),
        token: matches.get_one::<String>("token").cloned(),
        url: matches.get_one::<String>("url").cloned(),
        period: None,
        source: matches.get_one::<String>("source").cloned(),
        prefix: matches.get_one::<String>("prefix").cloned(),
        simulate: matches
            .get_flag("simulate")
            .then(|| "true".to_owned()),
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<std::path::PathBuf>("config") {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    config.apply_override(librato_config::extract_config_env_vars())?;
    config.apply_override(extract_config_args(matches))?;
    Ok(config)
}

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();
    let config = load_config(&matches)?;

    librato_log::init(config.logging());

    match matches.subcommand() {
        Some(("config", matches)) => manage_config(&config, matches),
        Some((_, _)) => {
            setup::check_config(&config)?;
            setup::dump_spawn_infos(&config);
            run(config, &matches)
        }
        None => unreachable!(),
    }
}

fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => setup::dump_config(config),
        _ => unreachable!(),
    }
}

/// Builds measurement options from the `--tag` and `--measurement-source` arguments.
fn measurement_options(matches: &ArgMatches) -> MeasurementOptions {
    let mut options = MeasurementOptions::new();
    for (key, value) in matches
        .get_many::<(String, String)>("tags")
        .into_iter()
        .flatten()
    {
        options = options.tag(key, value);
    }

    if let Some(source) = matches.get_one::<String>("measurement_source") {
        options = options.source(source);
    }

    options
}

fn annotation(matches: &ArgMatches) -> Annotation {
    let mut annotation = Annotation::new();

    if let Some(description) = matches.get_one::<String>("description") {
        annotation = annotation.description(description);
    }
    if let Some(stream) = matches.get_one::<String>("stream") {
        annotation = annotation.stream_name(stream);
    }
    if let Some(&secs) = matches.get_one::<u64>("start_time") {
        annotation = annotation.start_time(UnixTimestamp::from_secs(secs));
    }
    if let Some(&secs) = matches.get_one::<u64>("end_time") {
        annotation = annotation.end_time(UnixTimestamp::from_secs(secs));
    }
    for href in matches.get_many::<String>("links").into_iter().flatten() {
        annotation = annotation.link(AnnotationLink::new(href));
    }
    if let Some(source) = matches.get_one::<String>("measurement_source") {
        annotation = annotation.source(source);
    }

    annotation
}

/// Records the measurement or annotation of the given subcommand and delivers it.
///
/// Returns an error if anything could not be delivered.
fn run(config: Config, matches: &ArgMatches) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    runtime.block_on(async {
        let client = Librato::new();
        let mut events = client.subscribe();
        let simulate = config.simulate_enabled();
        client.init(config);

        match matches.subcommand() {
            Some(("increment", matches)) => {
                let name = required(matches, "name")?;
                let amount = matches.get_one::<f64>("by").copied().unwrap_or(1.0);
                client.increment_with(name, amount, measurement_options(matches));
            }
            Some(("measure", matches)) => {
                let name = required(matches, "name")?;
                let options = measurement_options(matches);
                for &value in matches.get_many::<f64>("values").into_iter().flatten() {
                    client.measure_with(name, value, options.clone());
                }
            }
            Some(("annotate", matches)) => {
                let title = required(matches, "title")?;
                client.annotate(title, annotation(matches)).await;
            }
            _ => unreachable!(),
        }

        client.end().await;

        if simulate {
            librato_log::info!("simulate mode, {} measurements not sent", client.pending());
        }

        let mut failure = None;
        while let Ok(event) = events.try_recv() {
            match event {
                ClientEvent::Sent { batch, duration } => librato_log::info!(
                    "sent {} measurements in {}ms",
                    batch.len(),
                    duration.as_millis()
                ),
                ClientEvent::Error(error) => failure = Some(error),
                ClientEvent::Sending(_) => (),
            }
        }

        match failure {
            Some(error) => Err(format_err!("delivery failed: {error}")),
            None => Ok(()),
        }
    })
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| format_err!("missing argument {id}"))
}
