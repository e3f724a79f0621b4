//! Purpose: Hold top-level CLI command dispatch for `fbscrape`.
//! Exports: `dispatch_command`.
//! Role: Map subcommands to an operation name plus parameter payload, run it, persist the outcome.
//! Invariants: Optional flags that were not supplied never appear in the payload.
//! Invariants: Credentials are loaded only for scrape commands, before any network call.

use super::*;

use fbscrape::api::{
    ClientConfig, JobResult, OPERATIONS, Orchestrator, ParameterPayload, Params, ThordataClient,
};

pub(super) fn dispatch_command(
    command: Command,
    settings: &RunSettings,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "fbscrape", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            if io::stdout().is_terminal() {
                println!("fbscrape {}", env!("CARGO_PKG_VERSION"));
            } else {
                emit_json(json!({
                    "name": "fbscrape",
                    "version": env!("CARGO_PKG_VERSION"),
                }));
            }
            Ok(RunOutcome::ok())
        }
        Command::Operations { json } => {
            emit_operations(json);
            Ok(RunOutcome::ok())
        }
        Command::Post { url } => run_job(settings, "post_by_posts_url", Params::with_url(url).into()),
        Command::Event { command } => {
            let (operation, payload) = event_job(command);
            run_job(settings, operation, payload)
        }
        Command::Profile { url } => run_job(
            settings,
            "profile_by_profiles_url",
            Params::with_url(url).into(),
        ),
        Command::Comment(args) => {
            run_job(settings, "comment_by_comments_url", comment_payload(&args))
        }
    }
}

fn event_job(command: EventCommand) -> (&'static str, ParameterPayload) {
    match command {
        EventCommand::Eventlist {
            url,
            upcoming_events_only,
        } => (
            "event_by_eventlist_url",
            Params::with_url(url)
                .with_opt("upcoming_events_only", upcoming_events_only.then_some(true))
                .into(),
        ),
        EventCommand::Search { url } => {
            ("event_by_search_url", ParameterPayload::batch_of_urls(url))
        }
        EventCommand::Events { url } => {
            ("event_by_events_url", ParameterPayload::batch_of_urls(url))
        }
    }
}

fn comment_payload(args: &CommentArgs) -> ParameterPayload {
    Params::with_url(args.url.clone())
        .with_opt("get_all_replies", args.get_all_replies.then_some(true))
        .with_opt("limit_records", args.limit_records)
        .with_opt("comments_sort", args.comments_sort.map(CommentsSort::label))
        .into()
}

fn run_job(
    settings: &RunSettings,
    operation: &'static str,
    payload: ParameterPayload,
) -> Result<RunOutcome, Error> {
    let config = ClientConfig::from_env()?;
    let orchestrator = Orchestrator::new(ThordataClient::new(config)).with_wait(settings.wait);

    match orchestrator.execute(operation, payload)? {
        JobResult::Success(decoded) => {
            let path = output::save_json(&settings.output_dir, operation, &decoded)?;
            println!("Saved to {}", path.display());
            Ok(RunOutcome::ok())
        }
        JobResult::Failure(failure) => {
            let path = output::save_error(&settings.output_dir, operation, &failure)?;
            println!("Saved error to {}", path.display());
            Err(failure.into_error())
        }
    }
}

fn emit_operations(force_json: bool) {
    if force_json || !io::stdout().is_terminal() {
        let operations = OPERATIONS
            .iter()
            .map(|op| {
                json!({
                    "name": op.name,
                    "job_type_id": op.job_type_id,
                    "target": op.target_label,
                    "description": op.description,
                    "parameters": op.recognized_parameters,
                })
            })
            .collect::<Vec<_>>();
        emit_json(json!({ "operations": operations }));
        return;
    }

    let rows = OPERATIONS
        .iter()
        .map(|op| {
            vec![
                op.name.to_string(),
                op.job_type_id.to_string(),
                op.recognized_parameters.join(","),
                op.description.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    emit_table(&["OPERATION", "JOB TYPE", "PARAMETERS", "DESCRIPTION"], &rows);
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, comment_payload, event_job};
    use clap::Parser;
    use fbscrape::api::{ParameterPayload, lookup};
    use serde_json::json;

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["fbscrape"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("cli").command
    }

    fn comment(args: &[&str]) -> ParameterPayload {
        let Command::Comment(comment_args) = parse(args) else {
            panic!("expected comment command");
        };
        comment_payload(&comment_args)
    }

    fn event(args: &[&str]) -> (&'static str, ParameterPayload) {
        let Command::Event { command } = parse(args) else {
            panic!("expected event command");
        };
        event_job(command)
    }

    #[test]
    fn comment_sort_only_payload_omits_unset_flags() {
        let payload = comment(&[
            "comment",
            "https://facebook.com/p/1",
            "--comments-sort",
            "Newest",
        ]);
        assert_eq!(
            serde_json::to_value(&payload).expect("json"),
            json!({"url": "https://facebook.com/p/1", "comments_sort": "Newest"})
        );
    }

    #[test]
    fn comment_payload_with_every_flag() {
        let payload = comment(&[
            "comment",
            "https://facebook.com/p/1",
            "--get-all-replies",
            "--limit-records",
            "25",
            "--comments-sort",
            "All comments",
        ]);
        assert_eq!(
            serde_json::to_value(&payload).expect("json"),
            json!({
                "url": "https://facebook.com/p/1",
                "get_all_replies": true,
                "limit_records": 25,
                "comments_sort": "All comments",
            })
        );
    }

    #[test]
    fn comment_rejects_non_numeric_limit() {
        let argv = ["fbscrape", "comment", "u", "--limit-records", "many"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn eventlist_flag_is_optional() {
        let (operation, payload) = event(&["event", "eventlist", "https://facebook.com/e"]);
        assert_eq!(operation, "event_by_eventlist_url");
        assert_eq!(
            serde_json::to_value(&payload).expect("json"),
            json!({"url": "https://facebook.com/e"})
        );

        let (_, payload) = event(&[
            "event",
            "eventlist",
            "https://facebook.com/e",
            "--upcoming-events-only",
        ]);
        assert_eq!(
            serde_json::to_value(&payload).expect("json"),
            json!({"url": "https://facebook.com/e", "upcoming_events_only": true})
        );
    }

    #[test]
    fn event_search_builds_one_entry_per_url() {
        let (operation, payload) = event(&["event", "search", "https://a", "https://b"]);
        assert_eq!(operation, "event_by_search_url");
        assert_eq!(
            payload,
            ParameterPayload::batch_of_urls(["https://a", "https://b"])
        );

        let (operation, payload) = event(&["event", "events", "https://c"]);
        assert_eq!(operation, "event_by_events_url");
        assert_eq!(payload.entries().len(), 1);
    }

    #[test]
    fn every_dispatched_operation_is_registered() {
        for name in [
            "post_by_posts_url",
            "event_by_eventlist_url",
            "event_by_search_url",
            "event_by_events_url",
            "profile_by_profiles_url",
            "comment_by_comments_url",
        ] {
            assert!(lookup(name).is_ok(), "{name}");
        }
    }
}
