use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{array, Array1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fs;

use single_subspace::local::{LocalSubspace, LocalSubspaceGenerator, LocalSubspaceProjector};
use single_subspace::sample::SampleType;
use single_subspace::subspace::{LdaSubspaceGenerator, PcaSubspaceGenerator};
use single_subspace::{
    DistanceMetric, OneNNClassifier, Sample, SampleSet, Subspace, SubspaceGenerator,
    SubspaceKind, SubspaceProjector,
};

fn noisy_set(count: usize, dim: usize, seed: u64) -> SampleSet {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let features: Array1<f64> = (0..dim).map(|_| rng.random_range(-5.0..5.0)).collect();
            Sample::new(features, format!("c{}", i % 3)).with_source(format!("s{:02}.raw", i))
        })
        .collect()
}

/// 8x8 images: class `top` is bright in the upper half, `bottom` in the
/// lower half.
fn image_set(count: usize, seed: u64) -> SampleSet {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let top = i % 2 == 0;
            let features: Array1<f64> = (0..64)
                .map(|p| {
                    let bright = (p < 32) == top;
                    let base = if bright { 200.0 } else { 20.0 };
                    base + rng.random_range(-10.0..10.0)
                })
                .collect();
            let label = if top { "top" } else { "bottom" };
            Sample::new(features, label).with_source(format!("img{:02}.pgm", i))
        })
        .collect()
}

#[test]
fn lda_separates_two_classes_and_classifies() {
    let learn: SampleSet = vec![
        Sample::new(array![0.0, 0.0], "A"),
        Sample::new(array![1.0, 0.0], "A"),
        Sample::new(array![0.5, 0.5], "A"),
        Sample::new(array![0.0, 5.0], "B"),
        Sample::new(array![1.0, 5.0], "B"),
        Sample::new(array![0.5, 4.5], "B"),
    ]
    .into();

    let lda = LdaSubspaceGenerator::new().generate(&learn).unwrap();
    assert_eq!(lda.kind(), SubspaceKind::Lda);
    // A single discriminant axis carries all the separation.
    assert!(lda.criterion()[0].abs() > 1.0);
    assert_abs_diff_eq!(lda.criterion()[1], 0.0, epsilon = 1e-9);
    assert!(lda.axis(0)[1].abs() > lda.axis(0)[0].abs());

    let projector = SubspaceProjector::new(&lda);
    let gallery = projector.project_set(&learn, 1).unwrap();
    let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);

    let near_a = projector.project(&Sample::new(array![0.5, 0.1], "?"), 1).unwrap();
    let near_b = projector.project(&Sample::new(array![0.5, 4.9], "?"), 1).unwrap();
    assert_eq!(classifier.classify(&near_a, &gallery, 0).unwrap(), "A");
    assert_eq!(classifier.classify(&near_b, &gallery, 0).unwrap(), "B");
}

#[test]
fn raw_two_class_points_classify_by_euclidean_distance() {
    let gallery: SampleSet = vec![
        Sample::new(array![0.0, 0.0], "A"),
        Sample::new(array![1.0, 0.0], "A"),
        Sample::new(array![0.0, 5.0], "B"),
        Sample::new(array![1.0, 5.0], "B"),
    ]
    .into();
    let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
    let a = Sample::new(array![0.5, 0.1], "?");
    let b = Sample::new(array![0.5, 4.9], "?");
    assert_eq!(classifier.classify(&a, &gallery, 0).unwrap(), "A");
    assert_eq!(classifier.classify(&b, &gallery, 0).unwrap(), "B");

    // Leave-one-out never runs out of candidates here.
    assert_relative_eq!(classifier.evaluate(&gallery, &gallery, 0).unwrap(), 1.0);
}

#[test]
fn pca_with_fewer_samples_than_dimensions() {
    let set = noisy_set(3, 5, 1);
    let pca = PcaSubspaceGenerator::new().generate(&set).unwrap();
    assert_eq!(pca.subspace_dim(), 3);
    assert_eq!(pca.original_dim(), 5);
    let nonzero = pca.criterion().iter().filter(|c| c.abs() > 1e-9).count();
    assert!(nonzero <= 3);
    assert!(nonzero >= 1);
}

#[test]
fn full_rank_pca_reconstructs_samples() {
    let set = noisy_set(12, 4, 2);
    let pca = PcaSubspaceGenerator::new().generate(&set).unwrap();
    let projector = SubspaceProjector::new(&pca);

    for sample in set.iter() {
        let projected = projector.project(sample, 0).unwrap();
        let mut reconstructed = pca.center().to_owned();
        for (i, &coefficient) in projected.features().iter().enumerate() {
            reconstructed.scaled_add(coefficient, &pca.axis(i));
        }
        for (r, o) in reconstructed.iter().zip(sample.features().iter()) {
            assert_abs_diff_eq!(r, o, epsilon = 1e-9);
        }
    }
}

#[test]
fn scatter_matrices_add_up() {
    let set = noisy_set(15, 6, 3);
    let b = set.between_class_scatter().unwrap();
    let w = set.within_class_scatter().unwrap();
    let t = set.total_scatter().unwrap();
    let sum = b.add(&w).unwrap();
    for i in 0..6 {
        for j in 0..6 {
            assert_relative_eq!(sum[(i, j)], t[(i, j)], epsilon = 1e-9, max_relative = 1e-9);
        }
    }
}

#[test]
fn saved_subspace_projects_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lda.dat");

    let set = noisy_set(30, 8, 4);
    let lda = LdaSubspaceGenerator::builder()
        .pca_dim(6)
        .build()
        .generate(&set)
        .unwrap();
    lda.save(&path).unwrap();
    let loaded = Subspace::load(&path).unwrap();
    assert_eq!(loaded, lda);

    let before = SubspaceProjector::new(&lda).project_set(&set, 0).unwrap();
    let after = SubspaceProjector::new(&loaded).project_set(&set, 0).unwrap();
    for (x, y) in before.iter().zip(after.iter()) {
        assert_eq!(x.features(), y.features());
        assert_eq!(x.label(), y.label());
    }
}

#[test]
fn local_subspace_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.dat");

    let set = image_set(20, 5);
    let generator = LocalSubspaceGenerator::builder(PcaSubspaceGenerator::new())
        .image_size(8, 8)
        .patch_size(4)
        .patch_stride(4)
        .build()
        .unwrap();
    let local = generator.generate(&set).unwrap();
    assert_eq!(local.descriptors().len(), 4);
    assert_eq!(local.num_features(), 64);
    for pair in local.features().windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    local.save(&path).unwrap();
    let loaded = LocalSubspace::load(&path).unwrap();
    assert_eq!(loaded, local);

    let projected = LocalSubspaceProjector::new(&loaded)
        .project_set(&set, 0)
        .unwrap();
    assert_eq!(projected.dim().unwrap(), 64);

    let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
    assert_relative_eq!(
        classifier.evaluate(&projected, &projected, 0).unwrap(),
        1.0
    );

    let capped = LocalSubspaceGenerator::builder(PcaSubspaceGenerator::new())
        .image_size(8, 8)
        .patch_size(4)
        .patch_stride(2)
        .max_features(10)
        .build()
        .unwrap()
        .generate(&set)
        .unwrap();
    assert_eq!(capped.descriptors().len(), 9);
    assert_eq!(capped.num_features(), 10);
}

#[test]
fn local_lda_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_lda.dat");

    // 40 images against 16-pixel patches, so every patch runs direct LDA.
    let set = image_set(40, 6);
    let local = LocalSubspaceGenerator::builder(LdaSubspaceGenerator::new())
        .image_size(8, 8)
        .patch_size(4)
        .patch_stride(4)
        .max_features(4)
        .build()
        .unwrap()
        .generate(&set)
        .unwrap();

    assert_eq!(local.descriptors().len(), 4);
    assert!(local.num_features() <= 4);
    for subspace in local.subspaces() {
        assert_eq!(subspace.kind(), SubspaceKind::Lda);
    }
    for pair in local.features().windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for feature in local.features() {
        let subspace = &local.subspaces()[feature.subspace_index];
        assert_eq!(feature.score, subspace.criterion()[feature.axis_index].abs());
    }

    local.save(&path).unwrap();
    let loaded = LocalSubspace::load(&path).unwrap();
    assert_eq!(loaded, local);

    let projected = LocalSubspaceProjector::new(&loaded)
        .project_set(&set, 0)
        .unwrap();
    assert_eq!(projected.dim().unwrap(), local.num_features());
    assert_eq!(projected[3].label(), set[3].label());

    let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
    assert_relative_eq!(
        classifier.evaluate(&projected, &projected, 0).unwrap(),
        1.0
    );
}

#[test]
fn samples_load_from_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let mut manifest = String::new();
    for (i, (label, value)) in [("a", 10u8), ("a", 12), ("b", 200), ("b", 190)]
        .iter()
        .enumerate()
    {
        let path = dir.path().join(format!("s{}.raw", i));
        fs::write(&path, vec![*value; 6]).unwrap();
        manifest.push_str(&format!("{} {}\n", path.display(), label));
    }
    let manifest_path = dir.path().join("learn.txt");
    fs::write(&manifest_path, manifest).unwrap();

    let set = SampleSet::load(&manifest_path, SampleType::U8, 0).unwrap();
    assert_eq!(set.len(), 4);
    assert_eq!(set.dim().unwrap(), 6);
    assert_eq!(set[2].label(), "b");
    assert_eq!(set[2][0], 200.0);
    assert_eq!(set.number_of_classes(), 2);

    let pca = PcaSubspaceGenerator::new().generate(&set).unwrap();
    let projected = SubspaceProjector::new(&pca).project_set(&set, 1).unwrap();
    let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
    assert_relative_eq!(
        classifier.evaluate(&projected, &projected, 0).unwrap(),
        1.0
    );
}
