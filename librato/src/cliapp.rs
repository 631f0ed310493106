//! This module implements the definition of the command line app.

use std::path::PathBuf;

use clap::builder::ValueParser;
use clap::{Arg, ArgAction, Command, value_parser};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Records metrics and annotations with the Librato metrics API.";

/// Parses a `key=value` tag argument.
fn parse_tag(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{value}'")),
    }
}

fn tag_arg() -> Arg {
    Arg::new("tags")
        .long("tag")
        .short('t')
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .value_parser(ValueParser::new(parse_tag))
        .help("Attach a tag to the measurement. Can be repeated.")
}

fn source_arg() -> Arg {
    Arg::new("measurement_source")
        .long("measurement-source")
        .value_name("SOURCE")
        .help("The source of this measurement, overriding the configured default.")
}

pub fn make_app() -> Command {
    Command::new("librato")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .propagate_version(true)
        .max_term_width(79)
        .version(VERSION)
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_name("CONFIG")
                .env("LIBRATO_CONFIG")
                .value_parser(value_parser!(PathBuf))
                .help("The path to the config folder."),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .global(true)
                .value_name("URL")
                .help("The base URL of the metrics API."),
        )
        .arg(
            Arg::new("email")
                .long("email")
                .global(true)
                .value_name("EMAIL")
                .help("The account email used for authentication."),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .value_name("TOKEN")
                .help("The API token used for authentication."),
        )
        .arg(
            Arg::new("source")
                .long("source")
                .global(true)
                .value_name("SOURCE")
                .help("The default source of all measurements."),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .global(true)
                .value_name("PREFIX")
                .help("A prefix prepended to all metric names."),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Collect measurements without sending anything."),
        )
        .subcommand(
            Command::new("increment")
                .about("Increment a counter")
                .after_help(
                    "This increments the counter by the given amount and sends it right \
                     away. Counters sharing a name, tags and source within one period are \
                     summed up by the metrics API.",
                )
                .arg(
                    Arg::new("name")
                        .required(true)
                        .value_name("NAME")
                        .help("The name of the counter."),
                )
                .arg(
                    Arg::new("by")
                        .long("by")
                        .value_name("AMOUNT")
                        .default_value("1")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64))
                        .help("The amount to increment by."),
                )
                .arg(tag_arg())
                .arg(source_arg()),
        )
        .subcommand(
            Command::new("measure")
                .about("Record gauge samples")
                .after_help(
                    "This records one or more samples of a gauge and sends them right away. \
                     Multiple samples are summarized into count, sum, min, max, last and \
                     standard deviation.",
                )
                .arg(
                    Arg::new("name")
                        .required(true)
                        .value_name("NAME")
                        .help("The name of the gauge."),
                )
                .arg(
                    Arg::new("values")
                        .required(true)
                        .num_args(1..)
                        .value_name("VALUE")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64))
                        .help("The sampled values."),
                )
                .arg(tag_arg())
                .arg(source_arg()),
        )
        .subcommand(
            Command::new("annotate")
                .about("File an annotation")
                .after_help(
                    "This records an out-of-band event, such as a deployment. Unless a \
                     stream is given, the annotation is filed under a stream derived from \
                     the title.",
                )
                .arg(
                    Arg::new("title")
                        .required(true)
                        .value_name("TITLE")
                        .help("The title of the annotation."),
                )
                .arg(
                    Arg::new("description")
                        .long("description")
                        .short('d')
                        .value_name("TEXT")
                        .help("Extra information about the event."),
                )
                .arg(
                    Arg::new("stream")
                        .long("stream")
                        .value_name("NAME")
                        .help("The stream to file the annotation under."),
                )
                .arg(
                    Arg::new("start_time")
                        .long("start-time")
                        .value_name("UNIX_SECONDS")
                        .value_parser(value_parser!(u64))
                        .help("The start of the event. Defaults to now."),
                )
                .arg(
                    Arg::new("end_time")
                        .long("end-time")
                        .value_name("UNIX_SECONDS")
                        .value_parser(value_parser!(u64))
                        .help("The end of the event."),
                )
                .arg(
                    Arg::new("links")
                        .long("link")
                        .value_name("URL")
                        .action(ArgAction::Append)
                        .help("A link to an associated resource. Can be repeated."),
                )
                .arg(source_arg()),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the client config")
                .after_help(
                    "This command provides basic config management. Credentials are read \
                     from the config file, the LIBRATO_EMAIL and LIBRATO_TOKEN environment \
                     variables, or the command line.",
                )
                .subcommand_required(true)
                .subcommand(
                    Command::new("show")
                        .about("Show the effective config with the token masked"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app() {
        make_app().debug_assert();
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(
            parse_tag("region=us-east-1"),
            Ok(("region".to_owned(), "us-east-1".to_owned()))
        );
        assert_eq!(
            parse_tag("query=a=b"),
            Ok(("query".to_owned(), "a=b".to_owned()))
        );
        assert!(parse_tag("region").is_err());
        assert!(parse_tag("=value").is_err());
    }

    #[test]
    fn test_measure_values() {
        let matches = make_app()
            .try_get_matches_from(["librato", "measure", "latency", "12", "-3.5", "-t", "a=1"])
            .unwrap();

        let (_, matches) = matches.subcommand().unwrap();
        let values: Vec<f64> = matches.get_many("values").unwrap().copied().collect();
        assert_eq!(values, [12.0, -3.5]);

        let tags: Vec<&(String, String)> = matches.get_many("tags").unwrap().collect();
        assert_eq!(tags, [&("a".to_owned(), "1".to_owned())]);
    }
}
