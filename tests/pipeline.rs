use std::path::Path;

use codevec::{
    ArtifactDir,
    Embedder,
    Error,
    PipelineConfig,
    Result,
    VectorIndex,
    ingestion::SkipReason,
    metadata::read_metadata,
    pipeline::run_pipeline,
    raw_vectors::read_raw_vectors,
};

/// Bag-of-bytes embedding: deterministic and sensitive to content.
struct ByteHistogram {
    fail_on: Option<&'static str>,
}

impl Embedder for ByteHistogram {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        if let Some(needle) = self.fail_on
            && text.contains(needle)
        {
            return Err(Error::Embedding(format!("refusing {needle}")));
        }
        let mut v = vec![0.0f32; 8];
        for b in text.bytes() {
            v[(b % 8) as usize] += 1.0;
        }
        Ok(v)
    }
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn artifact_dir(base: &Path) -> ArtifactDir {
    ArtifactDir::resolve(Some(base.join("out").as_path())).unwrap()
}

fn fixture(root: &Path) {
    write(
        &root.join("repo_a/lib/util.py"),
        "import os\n# helper\ndef helper(x):\n    return x + 1\n",
    );
    write(
        &root.join("repo_a/main.c"),
        "#include <stdio.h>\n/* entry */\nint main() { puts(\"hi\"); }\n",
    );
    write(&root.join("repo_a/util.py"), "def util():\n    pass\n");
    write(
        &root.join("repo_b/util.py"),
        "from x import y\ndef other(): return 'explode'\n",
    );
    write(&root.join("repo_b/comments.py"), "# nothing but a comment\n");
    write(
        &root.join("repo_b/page.html"),
        "<html><body><script>var n = 1; // count\n</script></body></html>",
    );
    write(&root.join("repo_b/README.md"), "# readme");
    write(&root.join("stray.c"), "int stray;");
}

#[test]
fn full_run_keeps_metadata_and_vectors_aligned() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("repos");
    fixture(&root);
    let artifacts = artifact_dir(tmp.path());

    let mut embedder = ByteHistogram { fail_on: None };
    let report = run_pipeline(
        &root,
        None,
        &artifacts,
        &mut embedder,
        &PipelineConfig::default(),
    )
    .unwrap();

    // README.md is not accepted and stray.c is outside any repository.
    assert_eq!(report.copied, 6);
    assert_eq!(report.working_dir, root.join("codefiles"));
    assert_eq!(report.skipped_because(&SkipReason::Empty), 1);
    assert_eq!(report.normalized, 5);
    assert_eq!(report.embedded, 5);
    assert!(report.index_written());
    assert_eq!(report.dimension, Some(8));

    let mut flat: Vec<String> = std::fs::read_dir(&report.working_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    flat.sort();
    assert_eq!(
        flat,
        vec![
            "comments.py",
            "main.c",
            "page.html",
            "util.py",
            "util_1.py",
            "util_2.py"
        ]
    );

    let records = read_metadata(&artifacts.metadata_file()).unwrap();
    let (dimension, raw) =
        read_raw_vectors(&artifacts.raw_vectors_file()).unwrap();
    assert_eq!(dimension, 8);
    assert_eq!(raw.len(), records.len() * dimension);

    for (pos, record) in records.iter().enumerate() {
        assert_eq!(record.embedding_index, pos);
        let text = std::fs::read_to_string(
            report.working_dir.join(&record.file_name),
        )
        .unwrap();
        assert_eq!(record.source_len, text.len());
        let expected = ByteHistogram { fail_on: None }.embed(&text).unwrap();
        assert_eq!(&raw[pos * dimension..(pos + 1) * dimension], &expected[..]);
    }

    let util = records.iter().find(|r| r.file_name == "util.py").unwrap();
    assert!(util.original_path.ends_with("repo_a/lib/util.py"));
}

#[test]
fn working_set_holds_canonical_text() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("repos");
    fixture(&root);
    let artifacts = artifact_dir(tmp.path());

    let report = run_pipeline(
        &root,
        None,
        &artifacts,
        &mut ByteHistogram { fail_on: None },
        &PipelineConfig::default(),
    )
    .unwrap();

    let read = |name: &str| {
        std::fs::read_to_string(report.working_dir.join(name)).unwrap()
    };
    assert_eq!(read("main.c"), "int main() { puts(STRING); }");
    assert_eq!(read("page.html"), "var n = 1; // count");
    assert_eq!(read("util.py"), "def helper(x):\nreturn x + 1");
    // Empty after normalization: left untouched.
    assert_eq!(read("comments.py"), "# nothing but a comment\n");
    // Sources are never modified.
    assert!(
        std::fs::read_to_string(root.join("repo_a/main.c"))
            .unwrap()
            .contains("/* entry */")
    );
}

#[test]
fn failed_embedding_is_skipped_and_counted() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("repos");
    fixture(&root);
    let artifacts = artifact_dir(tmp.path());

    let mut embedder = ByteHistogram {
        fail_on: Some("other"),
    };
    let report = run_pipeline(
        &root,
        None,
        &artifacts,
        &mut embedder,
        &PipelineConfig::default(),
    )
    .unwrap();

    assert_eq!(report.embedded, 4);
    assert_eq!(report.embedding_failures.len(), 1);
    assert_eq!(report.embedding_failures[0].file_name, "util_2.py");

    let index = VectorIndex::load(&artifacts).unwrap();
    assert_eq!(index.len(), 4);
    assert!(index.find("util_2.py").is_none());
}

#[test]
fn reloaded_index_matches_the_one_built_in_memory() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("repos");
    fixture(&root);
    let artifacts = artifact_dir(tmp.path());
    let config = PipelineConfig {
        batch_size: 2,
        ..PipelineConfig::default()
    };

    let report = run_pipeline(
        &root,
        None,
        &artifacts,
        &mut ByteHistogram { fail_on: None },
        &config,
    )
    .unwrap();

    let built = report.index.expect("index was written");
    let loaded = VectorIndex::load(&artifacts).unwrap();
    assert_eq!(loaded.records(), built.records());
    assert_eq!(loaded.dimension(), built.dimension());
    for record in built.records() {
        assert_eq!(
            loaded.vector_of(&record.file_name),
            built.vector_of(&record.file_name)
        );
        assert_eq!(
            loaded.neighbors_of(&record.file_name, 3).unwrap(),
            built.neighbors_of(&record.file_name, 3).unwrap()
        );
    }

    let query = built.vector_of("main.c").unwrap().to_vec();
    let hits = loaded.search(&query, 1).unwrap();
    assert_eq!(hits, built.search(&query, 1).unwrap());
    assert_eq!(hits[0].record.file_name, "main.c");
    assert_eq!(hits[0].distance, 0.0);

    assert!(matches!(
        loaded.search(&[1.0, 2.0], 1),
        Err(Error::DimensionMismatch { expected: 8, actual: 2 })
    ));
}

#[test]
fn nothing_embedded_writes_no_index() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("repos");
    write(&root.join("repo/only.py"), "# just a comment\n");
    let artifacts = artifact_dir(tmp.path());

    let report = run_pipeline(
        &root,
        None,
        &artifacts,
        &mut ByteHistogram { fail_on: None },
        &PipelineConfig::default(),
    )
    .unwrap();

    assert_eq!(report.embedded, 0);
    assert!(!report.index_written());
    assert!(!artifacts.index_file().exists());
    assert!(matches!(
        VectorIndex::load(&artifacts),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn empty_rebuild_removes_previous_index() {
    let tmp = tempfile::tempdir().unwrap();
    let full = tmp.path().join("full");
    fixture(&full);
    let artifacts = artifact_dir(tmp.path());

    run_pipeline(
        &full,
        None,
        &artifacts,
        &mut ByteHistogram { fail_on: None },
        &PipelineConfig::default(),
    )
    .unwrap();
    assert!(VectorIndex::load(&artifacts).is_ok());

    let empty = tmp.path().join("empty");
    write(&empty.join("repo/only.py"), "# just a comment\n");
    let report = run_pipeline(
        &empty,
        None,
        &artifacts,
        &mut ByteHistogram { fail_on: None },
        &PipelineConfig::default(),
    )
    .unwrap();

    assert!(!report.index_written());
    assert_eq!(report.stale_removed, 3);
    assert!(!artifacts.index_file().exists());
    assert!(!artifacts.metadata_file().exists());
    assert!(!artifacts.raw_vectors_file().exists());
    assert!(matches!(
        VectorIndex::load(&artifacts),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn unsupported_extension_is_copied_but_not_indexed() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("repos");
    fixture(&root);
    let artifacts = artifact_dir(tmp.path());
    let config = PipelineConfig::default().with_extensions(&[".md", ".c"]);

    let report = run_pipeline(
        &root,
        Some(tmp.path().join("flat").as_path()),
        &artifacts,
        &mut ByteHistogram { fail_on: None },
        &config,
    )
    .unwrap();

    assert_eq!(report.copied, 2);
    assert_eq!(report.skipped_because(&SkipReason::Unsupported), 1);
    assert_eq!(report.embedded, 1);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("flat/README.md")).unwrap(),
        "# readme"
    );
}

#[test]
fn missing_root_fails_before_side_effects() {
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = artifact_dir(tmp.path());
    let dest = tmp.path().join("flat");

    let err = run_pipeline(
        &tmp.path().join("missing"),
        Some(dest.as_path()),
        &artifacts,
        &mut ByteHistogram { fail_on: None },
        &PipelineConfig::default(),
    );

    assert!(matches!(err, Err(Error::InvalidRoot(_))));
    assert!(!dest.exists());
    assert!(!artifacts.root().exists());
}
