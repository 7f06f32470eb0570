use approx::assert_relative_eq;
use mtf_nps_dqe::{
    dqe, io,
    io::Mrc,
    mtf,
    nps::{self, NpsOptions},
    simulate, CropRegion, Curve, Metric, SimulationConfig,
};

#[test]
fn white_noise_nps0() {
    let config = SimulationConfig::default()
        .shape(64)
        .frames(64)
        .seed(Some(7));
    let frames = simulate::flat_fields(&config).unwrap();
    assert_eq!(frames.dim(), (64, 64, 64));

    let measurement = nps::measure(frames.view(), &NpsOptions::default()).unwrap();
    // 8 bits counts of N(100, 10²), less the variance taken by the mean frame
    let expected = 100. * (1. - 1. / 64.);
    assert_relative_eq!(measurement.nps0, expected, max_relative = 0.1);
    assert_relative_eq!(measurement.nps0_guess, expected, max_relative = 0.1);
    assert_eq!(measurement.curve.metric, Metric::Nps);
}

#[test]
fn detector_dqe() {
    let dir = tempfile::tempdir().unwrap();

    let edge = simulate::edge(&SimulationConfig::default().shape(256).seed(Some(1))).unwrap();
    let mtf_path = mtf::measure(edge.view(), CropRegion::centred(edge.dim()), 1)
        .unwrap()
        .curve
        .save(dir.path().join("mtf"))
        .unwrap();

    // recorded stack, first and last frames are dropped
    let frames = simulate::flat_fields(
        &SimulationConfig::default()
            .shape(64)
            .frames(34)
            .seed(Some(3)),
    )
    .unwrap();
    let stack_path = dir.path().join("flat.mrcs");
    Mrc::save(&stack_path, frames.mapv(|v| v as f32).view()).unwrap();
    let stack = io::load_stack(&stack_path).unwrap();
    assert_eq!(stack, frames);
    let stack = nps::trim_stack(stack.view(), 32).unwrap();
    assert_eq!(stack.dim(), (32, 32, 32));
    let nps_path = nps::measure(stack.view(), &NpsOptions::default().guess(true))
        .unwrap()
        .curve
        .save(dir.path().join("nps.npz"))
        .unwrap();

    let mtf = Curve::load(&mtf_path, Metric::Mtf).unwrap();
    let nps = Curve::load(&nps_path, Metric::Nps).unwrap();
    let label = dqe::label(None, Some(dir.path().join("dqe.npz")), &mtf_path, &nps_path);
    let dqe = dqe::calculate(&mtf, &nps, dqe::DQE0).unwrap().with_label(label);
    let dqe_path = dqe.save(dir.path().join("dqe.npz")).unwrap();

    let loaded = Curve::load_any(&dqe_path).unwrap();
    assert_eq!(loaded.metric, Metric::Dqe);
    assert_eq!(loaded.label.as_deref(), Some("dqe.npz"));
    assert_eq!(loaded.w, nps.w);
    // white noise: the DQE follows MTF² scaled by DQE(0)
    let w = loaded.w[5];
    assert_relative_eq!(
        loaded.at(w),
        dqe::DQE0 * mtf.at(w).powi(2) / nps.at(w),
        max_relative = 1e-9
    );
    assert!(loaded.at(0.5) > 0.5 * dqe::DQE0 * mtf.at(0.5).powi(2));
}

#[test]
fn unsupported_image() {
    assert!(matches!(
        io::load_frame("edge.png"),
        Err(io::ImageError::UnsupportedExtension(_))
    ));
}
