//! Test: Artifact Cleanup - no working file outlives its volume

use crate::common::*;
use flairprep::core::{MaskPolicy, Stage};
use std::sync::Arc;

/// Test that no intermediate remains after a failure at each stage
#[tokio::test]
async fn test_no_temp_files_after_any_stage_failure() {
    for tool in [Tool::Register, Tool::Resample, Tool::Extract] {
        let dataset = Dataset::new();
        let input = dataset.add_volume("sub01_FLAIR.nii.gz");
        let tools = Arc::new(MockFsl::new().with_fault("sub01", tool, Fault::Exit(1)));

        let summary = run_batch(&dataset.settings(), tools, vec![input]).await;

        assert_eq!(summary.failed, 1, "{:?}", tool);
        assert!(
            dataset.output_files().is_empty(),
            "{:?} left {:?}",
            tool,
            dataset.output_files()
        );
    }
}

/// Test that a stale working file from a crashed run is not taken for output
#[tokio::test]
async fn test_stale_temp_file_is_not_mistaken_for_output() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii.gz");
    let stale = dataset.output_dir().join("tmp_reg_sub01_FLAIR.nii.gz");
    write_volume(&stale, &brain_values(10.0));
    std::fs::write(dataset.output_dir().join("tmp_reg_sub01_FLAIR_mat.mat"), "stale").unwrap();

    let tools = Arc::new(MockFsl::new().with_fault("sub01", Tool::Register, Fault::NoOutput));
    let summary = run_batch(&dataset.settings(), tools, vec![input]).await;

    let (stage, error) = outcome_for(&summary, "sub01_FLAIR").failure().unwrap();
    assert_eq!(stage, Stage::Registration);
    assert!(error.contains("did not produce expected output"), "{}", error);
    assert!(dataset.output_files().is_empty());
}

/// Test that a volume's working files never collide with another's
#[tokio::test]
async fn test_concurrent_volumes_keep_separate_artifacts() {
    let dataset = Dataset::new();
    let inputs = vec![
        dataset.add_volume_with("a_FLAIR.nii.gz", &brain_values(10.0)),
        dataset.add_volume_with("b_FLAIR.nii.gz", &brain_values(500.0)),
    ];
    let tools = Arc::new(
        MockFsl::new()
            .with_fault("a_FLAIR", Tool::Register, Fault::Delay(std::time::Duration::from_millis(30)))
            .with_fault("b_FLAIR", Tool::Register, Fault::Delay(std::time::Duration::from_millis(30))),
    );

    let summary = run_batch(&dataset.settings_with(2, MaskPolicy::Retain), tools, inputs).await;

    assert_eq!(summary.succeeded, 2);
    let masks: Vec<String> = dataset
        .output_files()
        .into_iter()
        .filter(|n| n.ends_with("_mask.nii.gz"))
        .collect();
    assert_eq!(masks, vec!["a_FLAIR_mask.nii.gz", "b_FLAIR_mask.nii.gz"]);
    assert!(dataset.leftover_temp_files().is_empty());
}

/// Test that a failed final rename rolls back already published byproducts
#[cfg(unix)]
#[tokio::test]
async fn test_publication_failure_rolls_back_byproducts() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii.gz");
    // A non-empty directory squatting on the final name makes the rename fail
    let blocker = dataset.output_dir().join("sub01_FLAIR.nii.gz");
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("keep"), b"x").unwrap();

    let summary = run_batch(&dataset.settings(), Arc::new(MockFsl::new()), vec![input]).await;

    let outcome = outcome_for(&summary, "sub01_FLAIR");
    assert_eq!(outcome.failure().map(|f| f.0), Some(Stage::Publication));
    assert!(outcome.output.is_none());
    assert!(outcome.matrix.is_none());
    assert!(outcome.mask.is_none());
    assert_eq!(dataset.output_files(), vec!["sub01_FLAIR.nii.gz"]);
    assert!(blocker.is_dir());
}

/// Test that a failed re-run does not leave the earlier run's results behind
#[tokio::test]
async fn test_failed_rerun_removes_earlier_outputs() {
    for (tool, fault) in [(Tool::Register, Fault::Exit(1)), (Tool::Resample, Fault::Panic)] {
        let dataset = Dataset::new();
        let input = dataset.add_volume("sub01_FLAIR.nii.gz");

        let first = run_batch(&dataset.settings(), Arc::new(MockFsl::new()), vec![input.clone()]).await;
        assert_eq!(first.succeeded, 1);
        assert_eq!(dataset.output_files().len(), 3);

        let tools = Arc::new(MockFsl::new().with_fault("sub01", tool, fault));
        let second = run_batch(&dataset.settings(), tools, vec![input]).await;

        assert_eq!(second.failed, 1, "{:?}", fault);
        assert!(
            dataset.output_files().is_empty(),
            "{:?} kept {:?}",
            fault,
            dataset.output_files()
        );
    }
}

/// Test that switching to the discard policy drops a mask kept by an earlier run
#[tokio::test]
async fn test_discard_rerun_removes_earlier_mask() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii.gz");

    run_batch(&dataset.settings(), Arc::new(MockFsl::new()), vec![input.clone()]).await;
    assert!(dataset.output_dir().join("sub01_FLAIR_mask.nii.gz").is_file());

    let summary = run_batch(
        &dataset.settings_with(1, MaskPolicy::Discard),
        Arc::new(MockFsl::new()),
        vec![input],
    )
    .await;

    assert_done(outcome_for(&summary, "sub01_FLAIR"));
    assert_eq!(
        dataset.output_files(),
        vec!["sub01_FLAIR.nii.gz", "sub01_FLAIR_mat.mat"]
    );
}
