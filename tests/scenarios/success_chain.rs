//! Test: Success Chain - Register → Normalize → Resample → Extract → Publish

use crate::common::*;
use flairprep::core::{MaskPolicy, VolumeState};
use flairprep::ExecutionEvent;
use flairprep::BatchEngine;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};

/// Test that one volume runs every stage in order and publishes its results
#[tokio::test]
async fn test_single_volume_end_to_end() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii");
    let tools = Arc::new(MockFsl::new());

    let summary = run_batch(&dataset.settings(), tools.clone(), vec![input]).await;

    assert_eq!(summary.total, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let outcome = outcome_for(&summary, "sub01_FLAIR");
    assert_done(outcome);
    assert_eq!(
        outcome.output.as_deref(),
        Some(dataset.output_dir().join("sub01_FLAIR.nii.gz").as_path())
    );
    assert_eq!(
        dataset.output_files(),
        vec![
            "sub01_FLAIR.nii.gz",
            "sub01_FLAIR_mask.nii.gz",
            "sub01_FLAIR_mat.mat",
        ]
    );
    assert!(dataset.leftover_temp_files().is_empty());

    assert_eq!(
        tools.tools_run_for("sub01_FLAIR"),
        vec![Tool::Register, Tool::Resample, Tool::Extract]
    );
}

/// Test that the stage arguments carry the reference and processing settings
#[tokio::test]
async fn test_tool_arguments_follow_settings() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii.gz");
    let settings = flairprep::RunConfig {
        voxel_size: Some(2.0),
        bet_fraction: Some(0.3),
        ..dataset.config()
    }
    .resolve()
    .unwrap();
    let tools = Arc::new(MockFsl::new());

    run_batch(&settings, tools.clone(), vec![input.clone()]).await;

    let calls = tools.calls();
    assert_eq!(calls.len(), 3);

    let register = &calls[0];
    assert_eq!(register.value_of("-in"), Some(input.path().as_os_str()));
    assert_eq!(register.value_of("-ref"), Some(dataset.reference().as_os_str()));
    assert_eq!(
        register.value_of("-out"),
        Some(dataset.output_dir().join("tmp_reg_sub01_FLAIR.nii.gz").as_os_str())
    );

    let resample = &calls[1];
    assert_eq!(resample.value_of("-applyisoxfm"), Some(OsStr::new("2")));
    assert_eq!(
        resample.value_of("-in"),
        Some(dataset.output_dir().join("tmp_norm_sub01_FLAIR.nii.gz").as_os_str())
    );

    let extract = &calls[2];
    assert_eq!(extract.value_of("-f"), Some(OsStr::new("0.3")));
    assert_eq!(extract.value_of("-g"), Some(OsStr::new("0")));
    assert!(extract.has_flag("-m"));

    for call in &calls {
        assert!(call
            .env
            .contains(&("FSLOUTPUTTYPE".to_string(), "NIFTI_GZ".to_string())));
    }
}

/// Test that the published volume is foreground z-scored with background intact
#[tokio::test]
async fn test_output_is_normalized() {
    let dataset = Dataset::new();
    let original = brain_values(80.0);
    let input = dataset.add_volume_with("sub01_FLAIR.nii", &original);

    let summary = run_batch(&dataset.settings(), Arc::new(MockFsl::new()), vec![input]).await;
    let output = outcome_for(&summary, "sub01_FLAIR").output.clone().unwrap();
    let values = read_values(&output);

    let mut foreground = Vec::new();
    for (before, after) in original.iter().zip(&values) {
        if *before > 0.0 {
            foreground.push(*after);
        } else {
            assert_eq!(before.to_bits(), after.to_bits());
        }
    }
    let (mean, std) = mean_std(&foreground);
    assert!(mean.abs() < 1e-9, "mean {}", mean);
    assert!((std - 1.0).abs() < 1e-9, "std {}", std);
}

/// Test that a constant foreground passes through unchanged
#[tokio::test]
async fn test_constant_foreground_is_left_unchanged() {
    let dataset = Dataset::new();
    let constant: Vec<f64> = brain_values(1.0)
        .iter()
        .map(|v| if *v > 0.0 { 42.0 } else { 0.0 })
        .collect();
    let input = dataset.add_volume_with("flat_FLAIR.nii.gz", &constant);

    let summary = run_batch(&dataset.settings(), Arc::new(MockFsl::new()), vec![input]).await;
    let outcome = outcome_for(&summary, "flat_FLAIR");
    assert_done(outcome);

    let values = read_values(outcome.output.as_ref().unwrap());
    assert_eq!(values, constant);
    assert!(values.iter().all(|v| v.is_finite()));
}

/// Test that the discard policy leaves no mask behind
#[tokio::test]
async fn test_discard_mask_policy() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii.gz");

    let summary = run_batch(
        &dataset.settings_with(1, MaskPolicy::Discard),
        Arc::new(MockFsl::new()),
        vec![input],
    )
    .await;

    let outcome = outcome_for(&summary, "sub01_FLAIR");
    assert_done(outcome);
    assert!(outcome.mask.is_none());
    assert_eq!(
        dataset.output_files(),
        vec!["sub01_FLAIR.nii.gz", "sub01_FLAIR_mat.mat"]
    );
}

/// Test that the retained mask is reported in the outcome
#[tokio::test]
async fn test_retained_mask_is_published() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii.gz");

    let summary = run_batch(&dataset.settings(), Arc::new(MockFsl::new()), vec![input]).await;

    let outcome = outcome_for(&summary, "sub01_FLAIR");
    let mask = outcome.mask.as_ref().unwrap();
    assert_eq!(mask, &dataset.output_dir().join("sub01_FLAIR_mask.nii.gz"));
    assert!(read_values(mask).iter().all(|v| *v == 0.0 || *v == 1.0));
    assert_eq!(
        outcome.matrix.as_deref(),
        Some(dataset.output_dir().join("sub01_FLAIR_mat.mat").as_path())
    );
}

/// Test that state transitions are reported in order
#[tokio::test]
async fn test_stage_events_follow_state_machine() {
    let dataset = Dataset::new();
    let input = dataset.add_volume("sub01_FLAIR.nii");
    let mut engine = BatchEngine::new(Arc::new(MockFsl::new()), &dataset.settings());
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    engine.add_event_handler(move |event| {
        if let ExecutionEvent::StageCompleted { state, .. } = event {
            sink.lock().unwrap().push(state);
        }
    });

    engine.run(vec![input]).await;

    assert_eq!(
        *states.lock().unwrap(),
        vec![
            VolumeState::Registered,
            VolumeState::Normalized,
            VolumeState::Resampled,
            VolumeState::Done,
        ]
    );
}

/// Test that several volumes run on a bounded pool
#[tokio::test]
async fn test_bounded_concurrency_processes_all_inputs() {
    let dataset = Dataset::new();
    let mut tools = MockFsl::new();
    let mut inputs = Vec::new();
    for i in 1..=6 {
        let name = format!("sub{:02}_FLAIR.nii.gz", i);
        inputs.push(dataset.add_volume(&name));
        tools = tools.with_fault(
            &format!("sub{:02}", i),
            Tool::Register,
            Fault::Delay(std::time::Duration::from_millis(50)),
        );
    }
    let tools = Arc::new(tools);

    let summary = run_batch(
        &dataset.settings_with(3, MaskPolicy::Retain),
        tools.clone(),
        inputs,
    )
    .await;

    assert_eq!(summary.succeeded, 6);
    assert!(tools.peak_concurrency() <= 3, "peak {}", tools.peak_concurrency());
    assert!(tools.peak_concurrency() >= 2, "peak {}", tools.peak_concurrency());
    assert!(dataset.leftover_temp_files().is_empty());

    let stems: Vec<&str> = summary.outcomes.iter().map(|o| o.stem.as_str()).collect();
    assert_eq!(
        stems,
        vec!["sub01_FLAIR", "sub02_FLAIR", "sub03_FLAIR", "sub04_FLAIR", "sub05_FLAIR", "sub06_FLAIR"]
    );
}
