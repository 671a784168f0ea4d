//! Segment fan-out driven directly, without the surrounding pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{sentences, Call, ScriptedServices};
use reelgen::collaborators::PromptContext;
use reelgen::fanout::{FanoutError, FanoutSettings, RetrySchedule, SegmentFanout, SegmentPhase};
use reelgen::job::{Transcript, VisualStyle};
use reelgen::storage::{JobWorkspace, WorkspaceRoot};

fn fanout(services: &Arc<ScriptedServices>, max_concurrent: usize, retries: usize) -> SegmentFanout {
    let collaborators = ScriptedServices::collaborators(services);
    SegmentFanout::new(
        collaborators.prompts,
        collaborators.images,
        FanoutSettings {
            max_concurrent,
            retry: RetrySchedule::new(vec![Duration::from_millis(1); retries]),
            call_timeout: Duration::from_secs(5),
        },
    )
}

fn context() -> PromptContext {
    PromptContext {
        topic: "Lanterns".to_string(),
        description: "Paper lights over water".to_string(),
        essence: "lanterns".to_string(),
        style: VisualStyle::Watercolor,
    }
}

fn workspace(dir: &TempDir) -> JobWorkspace {
    WorkspaceRoot::new(dir.path()).for_job("job-1").unwrap()
}

#[tokio::test]
async fn test_images_returned_in_segment_order() {
    let dir = TempDir::new().unwrap();
    let services = Arc::new(ScriptedServices::new().with_image_delay(Duration::from_millis(5)));
    let transcript = Transcript::new(sentences(&["One.", "Two.", "Three.", "Four."], 800.0));

    let report = fanout(&services, 3, 0)
        .generate_segment_images(&workspace(&dir), context(), &transcript, &CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<String> = report
        .images
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["image_1.png", "image_2.png", "image_3.png", "image_4.png"]
    );
    for path in &report.images {
        assert!(path.exists());
    }
}

#[tokio::test]
async fn test_empty_transcript_rejected() {
    let dir = TempDir::new().unwrap();
    let services = Arc::new(ScriptedServices::new());

    let result = fanout(&services, 2, 0)
        .generate_segment_images(
            &workspace(&dir),
            context(),
            &Transcript::default(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(FanoutError::NoSegments)));
    assert!(services.calls().is_empty());
}

#[tokio::test]
async fn test_every_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let services = Arc::new(
        ScriptedServices::new()
            .broken_image("Two.")
            .failing_prompt("Four.", 10),
    );
    let transcript = Transcript::new(sentences(&["One.", "Two.", "Three.", "Four."], 800.0));

    let err = fanout(&services, 4, 1)
        .generate_segment_images(&workspace(&dir), context(), &transcript, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        FanoutError::Segments(failures) => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].index, 1);
            assert_eq!(failures[0].phase, SegmentPhase::Image);
            assert_eq!(failures[0].attempts, 2);
            assert_eq!(failures[1].index, 3);
            assert_eq!(failures[1].phase, SegmentPhase::Prompt);
        }
        other => panic!("unexpected: {:?}", other),
    }

    // Broken segments were retried, healthy ones rendered once
    assert_eq!(
        services.count(|c| matches!(c, Call::Image { prompt, .. } if prompt == "prompt: Two.")),
        2
    );
    assert_eq!(
        services.count(|c| matches!(c, Call::Image { prompt, .. } if prompt == "prompt: One.")),
        1
    );
    assert!(dir.path().join("job-1/images/image_1.png").exists());
    assert!(dir.path().join("job-1/images/image_3.png").exists());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let dir = TempDir::new().unwrap();
    let services = Arc::new(ScriptedServices::new());
    let transcript = Transcript::new(sentences(&["One.", "Two."], 800.0));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = fanout(&services, 2, 0)
        .generate_segment_images(&workspace(&dir), context(), &transcript, &cancel)
        .await;

    assert!(matches!(result, Err(FanoutError::Cancelled)));
    assert_eq!(services.count(|c| matches!(c, Call::Image { .. })), 0);
}
