use test_log::test;

use checkerboard_cal::{Config, Error, Key, Modes, run};

mod common;
use common::*;

#[test]
fn collect_then_calibrate() {
    let (_tmp, root) = utf8_tempdir();
    let cfg = config_in(&root);
    let views = rendered_views(board());
    let n = views.len();
    let mut module = ScriptedCameraModule::new(views.into_iter().map(Some).collect(), None);
    let mut keys = vec![Key::Space; n];
    keys.push(Key::Escape);
    let mut preview = ScriptedPreview::new(&keys);

    let modes = Modes {
        collect: true,
        calibrate: true,
        apply: false,
    };
    let summary = run(&cfg, modes, &mut module, &mut preview).unwrap();
    assert_eq!(summary.collected, Some(n));
    let report = summary.calibration.unwrap();
    assert_eq!(report.processed, n);
    assert!(report.calibration.rms_reprojection_error < 1.0);
    assert!(summary.applied.is_none());
    assert!(cfg.result_file.is_file());
}

#[test]
fn failing_stage_stops_the_run() {
    let (_tmp, root) = utf8_tempdir();
    let cfg = config_in(&root);
    let mut module = ScriptedCameraModule::new(vec![], Some(blank_image(64, 48)));
    let mut preview = ScriptedPreview::default();

    let modes = Modes {
        collect: false,
        calibrate: true,
        apply: true,
    };
    let r = run(&cfg, modes, &mut module, &mut preview);
    assert!(matches!(r, Err(Error::NoImages { .. })));
    assert_eq!(module.opened, 0);
}

#[test]
fn preview_without_calibration_file() {
    let (_tmp, root) = utf8_tempdir();
    let cfg = config_in(&root);
    let mut module = ScriptedCameraModule::new(vec![], Some(blank_image(64, 48)));
    let mut preview = ScriptedPreview::default();

    let modes = Modes::from_args(&["prog", "-h", "9", "-w", "6", "-v", "0", "-a"]);
    let r = run(&cfg, modes, &mut module, &mut preview);
    assert!(matches!(r, Err(Error::MissingCalibration { .. })));
    assert_eq!(module.opened, 0);
    assert!(preview.shown.is_empty());
}

#[test]
fn bad_dimensions_touch_nothing() {
    let r = Config::from_args(&["prog", "-h", "0", "-w", "6", "-v", "0", "-i", "-c", "-a"]);
    assert!(matches!(r, Err(Error::Configuration { .. })));
}
