mod common;

use common::synthetic::{grid_sheet, layout_from_sheet, paint_frame, BLUE, RED};
use mosaicfill::{
    run_session, DirectorySink, FrameSource, MosaicConfig, MosaicError, MosaicPipeline, OutputFormat,
    ReplaySource, TemplateLayout,
};
use std::fs;
use std::path::PathBuf;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mosaicfill-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_replay_manifest_to_directory() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = scratch_dir("replay");

    let sheet = grid_sheet(2, 2);
    let sheet_path = dir.join("quad.png");
    sheet.save(&sheet_path).unwrap();
    let layout = TemplateLayout::from_reference_image(&sheet_path, "quad", &MosaicConfig::default().layout).unwrap();
    assert_eq!(layout.patches().len(), 4);

    let reference = layout_from_sheet("quad", &sheet);
    paint_frame(&sheet, &reference, &[(0, RED)]).save(dir.join("f0.png")).unwrap();
    paint_frame(&sheet, &reference, &[(0, RED), (2, BLUE)]).save(dir.join("f1.png")).unwrap();
    fs::write(
        dir.join("frames.json"),
        r#"{ "frames": [
            { "image": "f0.png", "marker": [[40,40],[60,40],[60,60],[40,60]] },
            { "image": "f1.png", "command": "reset" },
            { "image": "f1.png" }
        ] }"#,
    )
    .unwrap();

    let out_dir = dir.join("out");
    let mut source = ReplaySource::open(&dir.join("frames.json")).unwrap();
    assert_eq!(source.remaining(), 3);
    let mut sink = DirectorySink::create(&out_dir, OutputFormat::Both).unwrap();
    let mut pipeline = MosaicPipeline::new(MosaicConfig::default(), vec![layout]).unwrap();

    let summary = run_session(&mut pipeline, &mut source, &mut sink).unwrap();
    drop(sink);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.resets, 1);
    assert!(!summary.quit);

    for index in 0..3 {
        assert!(out_dir.join(format!("frame_{:05}.png", index)).exists());
    }

    let report = fs::read_to_string(out_dir.join(DirectorySink::REPORT_FILE)).unwrap();
    let lines: Vec<serde_json::Value> = report
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["rotation"], 0);
    assert_eq!(lines[0]["layout_name"], "quad");
    assert_eq!(lines[0]["patches"][0]["label"], "Red");
    assert!(lines[0]["patches"][1]["label"].is_null());
    assert_eq!(lines[2]["patches"][2]["label"], "Blue");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_frame_image_is_capture_error() {
    let dir = scratch_dir("missing-frame");
    fs::write(dir.join("frames.json"), r#"{ "frames": [ { "image": "nope.png" } ] }"#).unwrap();

    let mut source = ReplaySource::open(&dir.join("frames.json")).unwrap();
    let err = source.next_frame().unwrap_err();
    assert!(matches!(err, MosaicError::Capture { .. }));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_png_only_sink_writes_no_report() {
    let dir = scratch_dir("png-only");
    let sink = DirectorySink::create(&dir, OutputFormat::Png).unwrap();
    assert_eq!(sink.frame_path(7), dir.join("frame_00007.png"));
    assert!(!dir.join(DirectorySink::REPORT_FILE).exists());
    let _ = fs::remove_dir_all(&dir);
}
