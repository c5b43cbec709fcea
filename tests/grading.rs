mod util;

use approx::assert_abs_diff_eq;
use thb_splines::prelude::*;
use util::*;

/// Refine the corner cell of the finest level `steps` times.
fn corner_steps<const D: usize>(hs: &mut HSpace<D>, steps: usize, truncate: bool) {
    for lv in 0..steps {
        hs.refine(&marked(lv, &[[0; D]]), truncate).unwrap();
    }
}

#[test]
fn ungraded_refinement_lets_levels_drift_apart() {
    let mut hs = uniform_space::<1>(2, 4);
    corner_steps(&mut hs, 2, false);
    assert_eq!(max_level_gap(&hs), 2);
}

#[test]
fn disparity_one_marks_coarse_neighbors() {
    let mut hs = uniform_space_with::<1>(2, 4, HSpaceOptions::default().with_disparity(1));
    corner_steps(&mut hs, 2, false);
    let deactivated: Vec<[usize; 1]> = hs.deactivated_cells(0).unwrap().iter().copied().collect();
    assert_eq!(deactivated, vec![[0], [1], [2]]);
    assert_eq!(max_level_gap(&hs), 1);
}

#[test]
fn graded_refinement_respects_disparity_in_2d() {
    for d in 1..=2 {
        let mut hs = uniform_space_with::<2>(2, 4, HSpaceOptions::default().with_disparity(d));
        for lv in 0..4 {
            hs.refine(&marked(lv, &[[0, 0]]), false).unwrap();
            assert!(max_level_gap(&hs) <= d, "disparity {d} violated after step {lv}");
            assert_abs_diff_eq!(active_volume(&hs), 1.0, epsilon = 1e-12);
            assert_active_cells_disjoint(&hs);
        }
        assert_eq!(hs.numlevels(), 5);
    }
}

#[test]
fn truncated_grading_marks_fewer_cells() {
    let mut base = uniform_space_with::<2>(2, 4, HSpaceOptions::default().with_disparity(1));
    corner_steps(&mut base, 2, false);

    let mut hb = base.clone();
    let mut thb = base.clone();
    let step = marked(2, &[[0, 0]]);
    hb.refine(&step, false).unwrap();
    thb.refine(&step, true).unwrap();

    let count = |hs: &HSpace<2>| -> usize {
        (0..hs.numlevels())
            .map(|lv| hs.active_cells(lv).unwrap().len())
            .sum()
    };
    assert!(count(&thb) <= count(&hb));
    for hs in [&hb, &thb] {
        assert!(hs.deactivated_cells(2).unwrap().contains(&[0, 0]));
        assert_abs_diff_eq!(active_volume(hs), 1.0, epsilon = 1e-12);
        assert!(max_truncated_level_gap(hs) <= 1);
    }
    assert!(max_level_gap(&hb) <= 1);
}

#[test]
fn truncated_grading_bounds_truncated_supports() {
    for d in 1..=2 {
        let mut hs = uniform_space_with::<2>(2, 4, HSpaceOptions::default().with_disparity(d));
        for lv in 0..4 {
            hs.refine(&marked(lv, &[[0, 0]]), true).unwrap();
            assert!(
                max_truncated_level_gap(&hs) <= d,
                "disparity {d} violated by truncated functions after step {lv}"
            );
            assert_abs_diff_eq!(active_volume(&hs), 1.0, epsilon = 1e-12);
            assert_active_cells_disjoint(&hs);
        }
    }
}

#[test]
fn truncated_grading_in_1d_marks_only_the_truncated_neighborhood() {
    let mut hs = uniform_space_with::<1>(2, 4, HSpaceOptions::default().with_disparity(1));
    corner_steps(&mut hs, 2, true);
    let deactivated: Vec<[usize; 1]> = hs.deactivated_cells(0).unwrap().iter().copied().collect();
    assert_eq!(deactivated, vec![[0], [1]]);
    assert_eq!(max_truncated_level_gap(&hs), 1);
    assert_eq!(max_level_gap(&hs), 2);
}

#[test]
fn zero_disparity_is_rejected() {
    let kv = make_knots(2, 0.0, 1.0, 4).unwrap();
    let err = HSpace::with_options([kv], HSpaceOptions::default().with_disparity(0)).unwrap_err();
    assert_eq!(err, HSplineError::InvalidDisparity(0));
}
