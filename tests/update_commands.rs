//! End-to-end runs of the update commands against the in-memory database

use changeguard::changelog::{ChangeLog, ChangeSet, ExecType, RanChangeSet};
use changeguard::command::{self, CommandStep, UpdateArguments, UpdateSummary};
use changeguard::database::{Database, InMemoryDatabase};
use changeguard::iterator::ChangeSetStatus;
use changeguard::mdc::MdcKey;
use changeguard::{ChangeguardError, UpdateCommandStep, UpdateCountCommandStep, UpdateToTagCommandStep};
use proptest::prelude::*;
use rstest::rstest;

const PATH: &str = "db/changelog.toml";

fn change_log() -> ChangeLog {
    ChangeLog::from_change_sets(
        PATH,
        vec![
            ChangeSet::builder("1", "alice", PATH)
                .statement("CREATE TABLE account (id BIGINT PRIMARY KEY)")
                .build()
                .unwrap(),
            ChangeSet::builder("2", "alice", PATH)
                .contexts("test")
                .statement("INSERT INTO account VALUES (1)")
                .build()
                .unwrap(),
            ChangeSet::builder("3", "bob", PATH)
                .dbms("mysql")
                .statement("ALTER TABLE account ENGINE = InnoDB")
                .build()
                .unwrap(),
            ChangeSet::builder("4", "bob", PATH)
                .labels("billing")
                .statement("CREATE TABLE invoice (id BIGINT PRIMARY KEY)")
                .tag("v1.0")
                .build()
                .unwrap(),
            ChangeSet::builder("5", "bob", PATH)
                .statement("CREATE TABLE audit (id BIGINT PRIMARY KEY)")
                .build()
                .unwrap(),
        ],
    )
    .unwrap()
}

fn args(contexts: Option<&str>, labels: Option<&str>) -> UpdateArguments {
    UpdateArguments::parse(contexts, labels, Some("verbose")).unwrap()
}

fn applied_ids(db: &InMemoryDatabase) -> Vec<String> {
    db.ledger().iter().map(|ran| ran.identity.id.clone()).collect()
}

#[test]
fn update_applies_matching_change_sets_in_order() {
    let mut db = InMemoryDatabase::default();

    let report = command::update(&UpdateCommandStep, &mut db, &change_log(), &args(Some("prod"), None)).unwrap();

    assert_eq!(applied_ids(&db), vec!["1", "4", "5"]);
    let summary = report.update_summary();
    assert_eq!((summary.run, summary.previously_run, summary.filtered_out), (3, 0, 2));
    let rendered = report.render_summary().unwrap();
    assert!(rendered.contains("DBMS mismatch"));
    assert!(rendered.contains("Context mismatch"));
}

#[test]
fn label_expression_selects_change_sets() {
    let mut db = InMemoryDatabase::default();
    command::update(&UpdateCommandStep, &mut db, &change_log(), &args(None, Some("!billing"))).unwrap();
    assert_eq!(applied_ids(&db), vec!["1", "2", "5"]);
}

#[test]
fn second_update_is_a_no_op() {
    let change_log = change_log();
    let mut db = InMemoryDatabase::default();
    command::update(&UpdateCommandStep, &mut db, &change_log, &UpdateArguments::default()).unwrap();
    let ledger = db.ledger().to_vec();

    let report = command::update(&UpdateCommandStep, &mut db, &change_log, &UpdateArguments::default()).unwrap();

    assert!(report.applied().is_empty());
    assert_eq!(db.ledger(), ledger.as_slice());
    let reasons: Vec<&str> = report
        .summary()
        .rejected()
        .flat_map(|d| d.rejections().map(|r| r.mdc_name()))
        .collect();
    assert!(reasons.contains(&"alreadyRan"));
}

#[test]
fn update_resumes_from_an_existing_ledger() {
    let change_log = change_log();
    let first = &change_log.change_sets()[0];
    let seeded = RanChangeSet::from_change_set(first, ExecType::Executed, 1, "earlier", chrono::Utc::now());
    let mut db = InMemoryDatabase::default().with_ledger(vec![seeded]);

    let report = command::update(&UpdateCommandStep, &mut db, &change_log, &UpdateArguments::default()).unwrap();

    assert_eq!(applied_ids(&db), vec!["1", "2", "4", "5"]);
    assert_eq!(db.ledger()[1].order_executed, 2);
    let results = report.summary().results_for(first.identity()).unwrap();
    let rejected: Vec<&str> = results.iter().filter(|r| !r.is_accepted()).map(|r| r.mdc_name()).collect();
    assert_eq!(rejected, vec!["alreadyRan"]);
}

#[rstest]
#[case(2, vec!["1", "2"])]
#[case(0, vec![])]
#[case(10, vec!["1", "2", "4", "5"])]
fn update_count_bounds_the_run(#[case] count: usize, #[case] expected: Vec<&str>) {
    let mut db = InMemoryDatabase::default();
    let step = UpdateCountCommandStep::new(count);

    let report = command::update(&step, &mut db, &change_log(), &UpdateArguments::default()).unwrap();

    assert_eq!(applied_ids(&db), expected);
    assert_eq!(report.metadata().get(MdcKey::UPDATE_COUNT), Some(count.to_string().as_str()));
}

#[test]
fn update_to_tag_applies_through_tag() {
    let mut db = InMemoryDatabase::default();
    let step = UpdateToTagCommandStep::new("v1.0").unwrap();

    let report = command::update(&step, &mut db, &change_log(), &UpdateArguments::default()).unwrap();

    assert_eq!(applied_ids(&db), vec!["1", "2", "4"]);
    assert_eq!(report.metadata().get(MdcKey::UPDATE_TO_TAG), Some("v1.0"));
    assert_eq!(report.metadata().get(MdcKey::COMMAND_NAME), Some("updateToTag"));
    let after_tag = report.summary().rejected().last().unwrap();
    assert_eq!(after_tag.change_set.id, "5");
    assert_eq!(after_tag.rejections().next().unwrap().mdc_name(), "afterTag");
}

#[test]
fn failure_mid_run_keeps_earlier_change_sets() {
    let mut db = InMemoryDatabase::default().fail_on("4");

    let err = command::update(&UpdateCommandStep, &mut db, &change_log(), &UpdateArguments::default()).unwrap_err();

    match err {
        ChangeguardError::ExecutionFailed { change_set, applied_before, .. } => {
            assert_eq!(change_set.id, "4");
            assert_eq!(applied_before, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(applied_ids(&db), vec!["1", "2"]);
    assert!(db.ledger().iter().all(|ran| ran.exec_type == ExecType::Executed));
}

#[test]
fn invalid_arguments_fail_as_configuration_errors() {
    assert!(UpdateToTagCommandStep::from_arguments(Some(" ")).unwrap_err().is_configuration());
    assert!(UpdateToTagCommandStep::from_arguments(None).unwrap_err().is_configuration());
    assert!(UpdateCountCommandStep::from_arguments(Some("-1")).unwrap_err().is_configuration());
    assert!(UpdateArguments::parse(None, None, Some("everything")).unwrap_err().is_configuration());
}

fn status_would_apply(step: &dyn CommandStep, db: &InMemoryDatabase, change_log: &ChangeLog, args: &UpdateArguments) -> Vec<String> {
    command::status(step, db, change_log, args)
        .unwrap()
        .entries()
        .iter()
        .filter(|e| e.status == ChangeSetStatus::WouldApply)
        .map(|e| e.change_set.id.clone())
        .collect()
}

#[test]
fn status_does_not_touch_the_database() {
    let db = InMemoryDatabase::default();
    let step = UpdateToTagCommandStep::new("v1.0").unwrap();

    let report = command::status(&step, &db, &change_log(), &UpdateArguments::default()).unwrap();

    assert!(db.executed().is_empty());
    assert!(db.ran_change_sets().unwrap().is_empty());
    assert!(report.tag_reached());
    let bounded: Vec<&str> = report.bounded_entries().map(|e| e.change_set.id.as_str()).collect();
    assert_eq!(bounded, vec!["1", "2", "3", "4"]);
}

#[test]
fn status_summary_predicts_update_summary() {
    let change_log = change_log();
    let args = args(Some("prod"), None);
    let mut db = InMemoryDatabase::default();

    let status = command::status(&UpdateCommandStep, &db, &change_log, &args).unwrap();
    let update = command::update(&UpdateCommandStep, &mut db, &change_log, &args).unwrap();

    assert_eq!(status.update_summary(), update.update_summary());
    assert_eq!(status.render_summary(), update.render_summary());
    assert!(status.render_summary().unwrap().contains("Context mismatch"));
}

#[derive(Debug, Clone)]
enum Operation {
    Update,
    Count(usize),
    ToTag(&'static str),
}

impl Operation {
    fn step(&self) -> Box<dyn CommandStep> {
        match self {
            Operation::Update => Box::new(UpdateCommandStep),
            Operation::Count(count) => Box::new(UpdateCountCommandStep::new(*count)),
            Operation::ToTag(tag) => Box::new(UpdateToTagCommandStep::new(*tag).unwrap()),
        }
    }
}

proptest! {
    /// Status predicts exactly what the update then applies, from any ledger state
    #[test]
    fn status_matches_update(
        warmup in 0usize..6,
        operation in prop_oneof![
            Just(Operation::Update),
            (0usize..6).prop_map(Operation::Count),
            prop::sample::select(vec!["v1.0", "unknown"]).prop_map(Operation::ToTag),
        ],
        contexts in prop::sample::select(vec!["", "test", "prod"]),
        labels in prop::sample::select(vec!["", "billing", "!billing"]),
        show_summary in prop::sample::select(vec![UpdateSummary::Off, UpdateSummary::Verbose]),
    ) {
        let change_log = change_log();
        let mut db = InMemoryDatabase::default();
        command::update(&UpdateCountCommandStep::new(warmup), &mut db, &change_log, &UpdateArguments::default()).unwrap();

        let args = UpdateArguments::parse(Some(contexts), Some(labels), Some(show_summary.as_str())).unwrap();
        let step = operation.step();

        let predicted = status_would_apply(step.as_ref(), &db, &change_log, &args);
        let report = command::update(step.as_ref(), &mut db, &change_log, &args).unwrap();
        let applied: Vec<String> = report.applied_ids().map(|id| id.id.clone()).collect();

        prop_assert_eq!(predicted, applied);
    }
}
