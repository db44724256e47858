// End-to-end tests: CSV tables on disk through generation, batching and
// commit into a recording session.

use super::*;
use crate::backend::recording::RecordingSession;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "attributes": {
        "id": "LONG",
        "name": "STRING",
        "country": "STRING",
        "link": "STRING",
        "start_date": "DATETIME"
    },
    "relations": {
        "officer_of": ["is_officer_of", "has_officer"],
        "similar": ["similar_entity"]
    }
}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("entities")).unwrap();
        fs::create_dir(dir.path().join("relations")).unwrap();
        Self { dir }
    }

    fn entity(&self, file: &str, content: &str) -> &Self {
        fs::write(self.dir.path().join("entities").join(file), content).unwrap();
        self
    }

    fn relation(&self, file: &str, content: &str) -> &Self {
        fs::write(self.dir.path().join("relations").join(file), content).unwrap();
        self
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self, batch_size: usize) -> MigrationConfig {
        MigrationConfig {
            entities_dir: self.path().join("entities"),
            relations_dir: self.path().join("relations"),
            reversed: HashSet::new(),
            aliases: HashMap::from([
                ("entities".to_string(), "org_entity".to_string()),
                ("officers".to_string(), "officer".to_string()),
            ]),
            load: LoadOptions {
                batch_size: NonZeroUsize::new(batch_size).unwrap(),
                num_workers: 3,
                fail_fast: false,
            },
            ..MigrationConfig::default()
        }
    }
}

fn catalog() -> SchemaCatalog {
    SchemaCatalog::from_json(CATALOG).unwrap()
}

async fn run(session: &Arc<RecordingSession>, config: MigrationConfig) -> Result<MigrationSummary> {
    Migration::new(session.clone(), catalog(), config)?.run().await
}

#[tokio::test]
async fn test_entity_row_with_missing_country() {
    let fx = Fixture::new();
    fx.entity("nodes-entities_clean_formatted.csv", "_id,name,country\n7,Acme,\n");
    let session = Arc::new(RecordingSession::new());

    let summary = run(&session, fx.config(250)).await.unwrap();

    assert_eq!(summary.tables.len(), 1);
    assert_eq!(summary.tables[0].0, "org_entity");
    assert_eq!(
        session.committed(),
        vec![vec!["insert $x isa org_entity, has id 7, has name 'Acme';".to_string()]]
    );
}

#[tokio::test]
async fn test_entities_commit_before_relations() {
    let fx = Fixture::new();
    fx.entity("nodes-officers.csv", "_id,name\n1,Alice\n2,Bob\n")
        .entity("nodes-entities.csv", "_id,name,country\n10,Acme,UK\n11,Globex,nan\n")
        .relation(
            "relationships_officer_of.csv",
            "_start,_end,link,start_date\n1,10,director,2001-02-03\n2,11,,\n",
        );
    let session = Arc::new(RecordingSession::new());

    let summary = run(&session, fx.config(1)).await.unwrap();

    let things: Vec<&str> = summary.tables.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(things, vec!["org_entity", "officer", "officer_of"]);
    assert_eq!(summary.statements(), 6);

    let committed: Vec<String> = session.committed().into_iter().flatten().collect();
    let first_relation = committed.iter().position(|s| s.starts_with("match")).unwrap();
    assert!(committed[..first_relation].iter().all(|s| s.starts_with("insert $x isa")));
    assert_eq!(committed.len() - first_relation, 2);

    let relations: HashSet<&str> = committed[first_relation..].iter().map(String::as_str).collect();
    assert!(relations.contains(
        "match $start has id 1; $end has id 10; \
         insert (has_officer: $start, is_officer_of: $end) isa officer_of, \
         has link 'director', has start_date 2001-02-03T00:00:00;"
    ));
    assert!(relations.contains(
        "match $start has id 2; $end has id 11; \
         insert (has_officer: $start, is_officer_of: $end) isa officer_of;"
    ));
}

#[tokio::test]
async fn test_reversed_and_undirected_relations() {
    let fx = Fixture::new();
    fx.relation("relationships_officer_of.csv", "_start,_end\n1,2\n")
        .relation("similar.csv", "_start,_end\n3,4\n");
    let session = Arc::new(RecordingSession::new());

    let mut config = fx.config(10);
    config.reversed.insert("officer_of".to_string());
    config.player_type = Some("node".to_string());
    run(&session, config).await.unwrap();

    let committed: Vec<String> = session.committed().into_iter().flatten().collect();
    assert_eq!(
        committed,
        vec![
            "match $start isa node, has id 1; $end isa node, has id 2; \
             insert (is_officer_of: $start, has_officer: $end) isa officer_of;"
                .to_string(),
            "match $start isa node, has id 3; $end isa node, has id 4; \
             insert (similar_entity: $start, similar_entity: $end) isa similar;"
                .to_string(),
        ]
    );
}

#[tokio::test]
async fn test_default_config_follows_offshore_leaks_naming() {
    let fx = Fixture::new();
    fx.entity("nodes-officers.csv", "_id\n1\n")
        .relation("relationships_officer_of.csv", "_start,_end\n1,2\n");
    let session = Arc::new(RecordingSession::new());

    let config = MigrationConfig {
        entities_dir: fx.path().join("entities"),
        relations_dir: fx.path().join("relations"),
        ..MigrationConfig::default()
    };
    let summary = run(&session, config).await.unwrap();

    let things: Vec<&str> = summary.tables.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(things, vec!["officer", "officer_of"]);
    let committed: Vec<String> = session.committed().into_iter().flatten().collect();
    assert_eq!(
        committed,
        vec![
            "insert $x isa officer, has id 1;".to_string(),
            "match $start has id 1; $end has id 2; \
             insert (is_officer_of: $start, has_officer: $end) isa officer_of;"
                .to_string(),
        ]
    );
}

#[tokio::test]
async fn test_thousand_and_one_rows_make_five_batches() {
    let fx = Fixture::new();
    let mut csv = String::from("_id,name\n");
    for i in 0..1001 {
        csv.push_str(&format!("{},officer {}\n", i, i));
    }
    fx.entity("nodes-officers.csv", &csv);
    let session = Arc::new(RecordingSession::new());

    let summary = run(&session, fx.config(250)).await.unwrap();

    let report = &summary.tables[0].1;
    assert_eq!(report.batches, 5);
    assert_eq!(report.statements, 1001);
    let sizes: Vec<usize> = session.committed().iter().map(Vec::len).collect();
    assert_eq!(sizes.iter().sum::<usize>(), 1001);
    assert!(sizes.iter().all(|&n| n <= 250));
    assert_eq!(session.opened(), 5);
}

#[tokio::test]
async fn test_bad_cell_stops_run_before_any_commit_of_that_table() {
    let fx = Fixture::new();
    fx.entity("nodes-officers.csv", "_id,name\n1,Alice\nabc,Bob\n");
    let session = Arc::new(RecordingSession::new());

    let err = run(&session, fx.config(1)).await.unwrap_err();

    assert!(err.to_string().contains("nodes-officers.csv"), "{:#}", err);
    assert_eq!(session.opened(), 0);
}

#[tokio::test]
async fn test_unknown_relation_type_is_reported() {
    let fx = Fixture::new();
    fx.entity("nodes-officers.csv", "_id\n1\n")
        .relation("relationships_mystery.csv", "_start,_end\n1,1\n");
    let session = Arc::new(RecordingSession::new());

    let err = run(&session, fx.config(10)).await.unwrap_err();

    let root = err.downcast_ref::<crate::error::LoadError>().expect("load error");
    assert!(matches!(root, crate::error::LoadError::Configuration { thing, .. } if thing == "mystery"));
    // The entity table was already committed and stays committed
    assert_eq!(session.committed().len(), 1);
}

#[tokio::test]
async fn test_commit_failure_fails_the_run() {
    let fx = Fixture::new();
    fx.entity("nodes-officers.csv", "_id,name\n1,Alice\n2,Bob\n3,Carol\n");
    let session = Arc::new(RecordingSession::failing_on("'Bob'"));

    let err = run(&session, fx.config(1)).await.unwrap_err();

    assert!(format!("{:#}", err).contains("batch 1 failed"), "{:#}", err);
    assert_eq!(session.committed().len(), 2);
    assert_eq!(session.rolled_back().len(), 1);
}

#[tokio::test]
async fn test_script_backend_writes_committed_statements() {
    let fx = Fixture::new();
    fx.entity("nodes-officers.csv", "_id,name\n1,Alice\n");
    let out = fx.path().join("load.tql");

    let session = Arc::new(ScriptSession::create("offshoreleaks", &out).await.unwrap());
    let summary = Migration::new(session.clone(), catalog(), fx.config(10))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.statements(), 1);
    assert_eq!(session.commits(), 1);
    assert_eq!(
        fs::read_to_string(&out).unwrap(),
        "insert $x isa officer, has id 1, has name 'Alice';\n"
    );
}
