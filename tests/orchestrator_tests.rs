use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use trimx_web::adapters::mock_engine::{EngineCall, FailPoint};
use trimx_web::adapters::{LocalFirstResources, MockEngine, TrimConfig};
use trimx_web::domain::model::{CropRect, EngineFile, EngineProgress, SourceFile, TrimOptions};
use trimx_web::{CancellationFlag, DomainError, EngineState, FailureKind, TrimError, TrimService};

/// Test utilities for driving the orchestrator against the mock engine
mod test_utils {
    use super::*;

    pub fn service() -> (Arc<MockEngine>, TrimService) {
        service_with_settle(0)
    }

    pub fn service_with_settle(settle_delay_ms: u64) -> (Arc<MockEngine>, TrimService) {
        let engine = Arc::new(MockEngine::new());
        let resources = Arc::new(LocalFirstResources::new(None, ""));
        let mut config = TrimConfig::default();
        config.limits.settle_delay_ms = settle_delay_ms;
        let service = TrimService::new(engine.clone(), resources, &config);
        (engine, service)
    }

    pub fn read_calls(engine: &MockEngine) -> usize {
        engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::ReadFile(_)))
            .count()
    }

    /// Sets the cancellation flag when a log event contains `needle`
    pub struct CancelOnLog {
        pub needle: &'static str,
        pub flag: Arc<CancellationFlag>,
    }

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CancelOnLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            if visitor.0.contains(self.needle) {
                self.flag.set();
            }
        }
    }

    pub fn source(size: usize) -> SourceFile {
        SourceFile::new("clip.mp4", vec![7u8; size])
    }

    pub fn options(start: f64, duration: f64) -> TrimOptions {
        TrimOptions::new(start, duration).unwrap()
    }

    pub fn contains_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    pub async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }
}

use test_utils::*;

#[tokio::test]
async fn test_successful_trim_returns_engine_output() {
    let (engine, service) = service();

    let artifact = service.run(&source(1024), &options(2.0, 3.0)).await.unwrap();

    assert_eq!(artifact.bytes, vec![1, 2, 3, 4]);
    assert_eq!(artifact.media_type, "video/mp4");
    assert!(engine.file_names().is_empty());
}

#[tokio::test]
async fn test_run_loads_engine_on_first_use() {
    let (engine, service) = service();
    assert_eq!(service.load_status(), EngineState::Unloaded);

    service.run(&source(10), &options(0.0, 1.0)).await.unwrap();
    service.run(&source(10), &options(0.0, 1.0)).await.unwrap();

    assert_eq!(service.load_status(), EngineState::Loaded);
    assert_eq!(engine.load_count(), 1);
}

#[tokio::test]
async fn test_text_output_is_returned_as_bytes() {
    let (engine, service) = service();
    engine.set_output(EngineFile::Text("mp4".to_string()));

    let artifact = service.run(&source(10), &options(0.0, 1.0)).await.unwrap();

    assert_eq!(artifact.bytes, b"mp4".to_vec());
}

#[tokio::test]
async fn test_stale_slots_are_cleared_before_write() {
    let (engine, service) = service();
    service.initialize().await.unwrap();
    engine.seed_file("output.mp4", vec![9, 9]);

    service.run(&source(10), &options(0.0, 1.0)).await.unwrap();

    let calls = engine.calls();
    let write_at = calls
        .iter()
        .position(|c| *c == EngineCall::WriteFile("input.mp4".to_string()))
        .unwrap();
    let stale_delete_at = calls
        .iter()
        .position(|c| *c == EngineCall::DeleteFile("output.mp4".to_string()))
        .unwrap();
    assert!(stale_delete_at < write_at);
}

#[tokio::test]
async fn test_plain_trim_uses_stream_copy_with_finalize() {
    let (engine, service) = service();

    service.run(&source(1024), &options(1.5, 4.0)).await.unwrap();

    let args = engine.last_exec_args().unwrap();
    assert!(contains_pair(&args, "-i", "input.mp4"));
    assert!(contains_pair(&args, "-ss", "1.5"));
    assert!(contains_pair(&args, "-t", "4"));
    assert!(contains_pair(&args, "-c", "copy"));
    assert!(contains_pair(&args, "-movflags", "+faststart"));
    assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
}

#[tokio::test]
async fn test_long_segment_skips_finalize() {
    let (engine, service) = service();

    service.run(&source(1024), &options(0.0, 12.0)).await.unwrap();

    let args = engine.last_exec_args().unwrap();
    assert!(!args.iter().any(|a| a == "-movflags"));
}

#[tokio::test]
async fn test_compression_clamps_quality_factor() {
    let (engine, service) = service();
    let opts = options(0.0, 2.0).with_compression(40);

    service.run(&source(1024), &opts).await.unwrap();

    let args = engine.last_exec_args().unwrap();
    assert!(contains_pair(&args, "-crf", "28"));
    assert!(contains_pair(&args, "-preset", "ultrafast"));
    assert!(contains_pair(&args, "-threads", "1"));
    assert!(!args.iter().any(|a| a == "-vf"));
}

#[tokio::test]
async fn test_crop_forces_reencode() {
    let (engine, service) = service();
    let opts = options(0.0, 2.0).with_crop(CropRect::new(10.7, -3.0, 640.9, 360.2));

    service.run(&source(1024), &opts).await.unwrap();

    let args = engine.last_exec_args().unwrap();
    assert!(contains_pair(&args, "-vf", "crop=640:360:10:0"));
    assert!(contains_pair(&args, "-preset", "veryfast"));
    assert!(contains_pair(&args, "-crf", "23"));
    assert!(!contains_pair(&args, "-c", "copy"));
}

#[tokio::test]
async fn test_invalid_crop_never_touches_engine() {
    let (engine, service) = service();
    let opts = options(0.0, 2.0).with_crop(CropRect::new(0.0, 0.0, 0.4, 100.0));

    let err = service.run(&source(1024), &opts).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::InvalidCropDimensions);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_during_stale_cleanup_skips_write() {
    let (engine, service) = service();
    service.initialize().await.unwrap();
    let flag = service.cancellation();
    engine.set_hook(Arc::new(move |call: &EngineCall| {
        if matches!(call, EngineCall::DeleteFile(_)) {
            flag.set();
        }
    }));

    let err = service.run(&source(10), &options(0.0, 1.0)).await.unwrap_err();

    assert_eq!(err, TrimError::OperationCancelled);
    assert_eq!(engine.write_count(), 0);
    assert_eq!(engine.exec_count(), 0);
}

#[tokio::test]
async fn test_cancel_after_write_removes_input() {
    let (engine, service) = service();
    let flag = service.cancellation();
    engine.set_hook(Arc::new(move |call: &EngineCall| {
        if matches!(call, EngineCall::WriteFile(_)) {
            flag.set();
        }
    }));

    let err = service.run(&source(10), &options(0.0, 1.0)).await.unwrap_err();

    assert!(err.is_benign());
    assert_eq!(engine.exec_count(), 0);
    assert!(!engine.has_file("input.mp4"));
}

#[tokio::test]
async fn test_cancel_during_exec_skips_read() {
    let (engine, service) = service();
    let flag = service.cancellation();
    engine.set_hook(Arc::new(move |call: &EngineCall| {
        if matches!(call, EngineCall::Exec(_)) {
            flag.set();
        }
    }));

    let err = service.run(&source(10), &options(0.0, 1.0)).await.unwrap_err();

    assert_eq!(err, TrimError::OperationCancelled);
    assert!(!engine
        .calls()
        .iter()
        .any(|c| matches!(c, EngineCall::ReadFile(_))));
    assert!(engine.file_names().is_empty());
}

#[tokio::test]
async fn test_cancel_before_execute_skips_exec() {
    let (engine, service) = service();
    let layer = CancelOnLog {
        needle: "Executing engine command",
        flag: service.cancellation(),
    };
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));

    let err = service.run(&source(10), &options(0.0, 1.0)).await.unwrap_err();

    assert_eq!(err, TrimError::OperationCancelled);
    assert_eq!(engine.write_count(), 1);
    assert_eq!(engine.exec_count(), 0);
    assert_eq!(read_calls(&engine), 0);
    assert!(engine.file_names().is_empty());
}

#[tokio::test]
async fn test_cancel_during_settle_skips_read() {
    let (engine, service) = service_with_settle(300);
    let file = source(10);
    let opts = options(0.0, 1.0);

    let (result, _) = tokio::join!(service.run(&file, &opts), async {
        wait_for(|| engine.exec_count() == 1).await;
        service.cancel();
    });

    assert_eq!(result.unwrap_err(), TrimError::OperationCancelled);
    assert_eq!(engine.exec_count(), 1);
    assert_eq!(read_calls(&engine), 0);
    assert!(engine.file_names().is_empty());
}

#[tokio::test]
async fn test_unvalidated_range_never_reaches_engine() {
    let (engine, service) = service();
    let literal = TrimOptions {
        start_time: -5.0,
        duration: 0.0,
        compression: None,
        crop: None,
    };

    let err = service.run(&source(10), &literal).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::InvalidTrimRange);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_deserialized_range_is_validated() {
    let (engine, service) = service();
    let payload: TrimOptions = serde_json::from_str(
        r#"{"start_time": 1.0, "duration": -3.0, "compression": null, "crop": null}"#,
    )
    .unwrap();

    let err = service.run(&source(10), &payload).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::InvalidTrimRange);
    assert_eq!(engine.exec_count(), 0);
}

#[tokio::test]
async fn test_read_memory_failure_from_file_layer_is_aborted() {
    let (engine, service) = service();
    engine.fail_with(
        FailPoint::Read,
        DomainError::FsFail("read output.mp4: Cannot allocate memory (os error 12)".into()),
    );

    let err = service.run(&source(1024), &options(0.0, 10.0)).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ProcessAborted);
    assert!(err.to_string().contains("estimated 1.0MB"));
}

#[tokio::test]
async fn test_file_layer_failure_without_known_text_is_filesystem() {
    let (engine, service) = service();
    engine.fail_with(
        FailPoint::Write,
        DomainError::FsFail("write input.mp4: Permission denied".into()),
    );

    let err = service.run(&source(10), &options(0.0, 1.0)).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::FilesystemInconsistency);
}

#[tokio::test]
async fn test_idle_abort_does_not_cut_short_next_exec() {
    let (engine, service) = service();
    service.initialize().await.unwrap();
    service.abort().await.unwrap();
    engine.hold_exec();

    let file = source(10);
    let opts = options(0.0, 1.0);
    let (result, _) = tokio::join!(service.run(&file, &opts), async {
        wait_for(|| engine.exec_count() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.release_exec();
    });

    assert_eq!(result.unwrap().bytes, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_next_run_clears_previous_cancellation() {
    let (_engine, service) = service();
    service.cancel();

    assert!(service.run(&source(10), &options(0.0, 1.0)).await.is_ok());
}

#[tokio::test]
async fn test_slots_removed_after_each_failure_point() {
    for point in [FailPoint::Write, FailPoint::Exec, FailPoint::Read] {
        let (engine, service) = service();
        engine.fail_at(point, "something went sideways");

        assert!(service.run(&source(10), &options(0.0, 1.0)).await.is_err());
        assert!(engine.file_names().is_empty(), "slots left after {:?}", point);
    }
}

#[tokio::test]
async fn test_cleanup_failure_does_not_mask_primary_error() {
    let (engine, service) = service();
    engine.fail_at(FailPoint::Exec, "Aborted(OOM)");
    engine.fail_at(FailPoint::Delete, "ENOENT");

    let err = service.run(&source(10), &options(0.0, 1.0)).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ProcessAborted);
}

#[tokio::test]
async fn test_engine_failures_are_classified() {
    let cases = [
        (FailPoint::Exec, "Aborted(OOM)", FailureKind::ProcessAborted),
        (FailPoint::Write, "ENOENT: no such file", FailureKind::FilesystemInconsistency),
        (FailPoint::Exec, "out of memory", FailureKind::ResourceExhausted),
        (FailPoint::Exec, "codec exploded", FailureKind::ProcessingFailed),
    ];

    for (point, message, expected) in cases {
        let (engine, service) = service();
        engine.fail_at(point, message);

        let err = service
            .run(&source(3 * 1024 * 1024), &options(0.0, 5.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), expected, "message: {}", message);
    }
}

#[tokio::test]
async fn test_read_stage_memory_failure_reports_estimate() {
    let (engine, service) = service();
    engine.fail_at(FailPoint::Read, "memory access out of bounds");
    let opts = options(0.0, 10.0).with_compression(23);

    let err = service.run(&source(1024), &opts).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ProcessAborted);
    assert!(err.to_string().contains("estimated 0.6MB"));
}

#[tokio::test]
async fn test_logged_abort_upgrades_generic_failure() {
    let (engine, service) = service();
    engine.set_exec_logs(vec!["Aborted()".to_string()]);
    engine.fail_at(FailPoint::Exec, "exit code 1");

    let err = service.run(&source(1024), &options(0.0, 2.0)).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ProcessAborted);
}

#[tokio::test]
async fn test_failed_load_surfaces_initialization_error() {
    let (engine, service) = service();
    engine.fail_at(FailPoint::Load, "wasm fetch failed");

    let err = service.run(&source(10), &options(0.0, 1.0)).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::InitializationFailed);
    assert_eq!(service.load_status(), EngineState::Error);
    assert_eq!(engine.write_count(), 0);
}

#[tokio::test]
async fn test_progress_is_forwarded_to_subscriber() {
    let (_engine, service) = service();
    let seen: Arc<Mutex<Vec<EngineProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    service.on_progress(Arc::new(move |p: EngineProgress| {
        sink.lock().unwrap().push(p);
    }));

    service.run(&source(10), &options(0.0, 1.0)).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen.last().unwrap().ratio, 1.0);
}

#[tokio::test]
async fn test_abort_terminates_and_reloads_engine() {
    let (engine, service) = service();
    let service = Arc::new(service);
    engine.hold_exec();

    let running = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run(&source(10), &options(0.0, 1.0)).await })
    };
    wait_for(|| engine.exec_count() == 1).await;

    service.abort().await.unwrap();
    let err = running.await.unwrap().unwrap_err();

    assert_eq!(err, TrimError::OperationCancelled);
    assert!(engine.calls().contains(&EngineCall::Terminate));
    assert_eq!(engine.load_count(), 2);
    assert!(service.is_loaded());
}
