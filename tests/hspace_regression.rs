mod util;

use approx::assert_abs_diff_eq;
use nalgebra::DVector;
use thb_splines::prelude::*;
use util::*;

fn refined_bicubic() -> HSpace<2> {
    let mut hs = uniform_space::<2>(3, 3);
    hs.refine(&marked(0, &[[0, 0], [0, 1], [1, 0], [1, 1], [0, 2]]), false)
        .unwrap();
    hs.refine(&marked(1, &[[0, 0], [0, 1], [2, 0], [1, 0], [1, 1]]), false)
        .unwrap();
    hs
}

#[test]
fn initial_space_has_one_level() {
    let hs = uniform_space::<2>(3, 3);
    assert_eq!(hs.numlevels(), 1);
    assert_eq!(hs.numactive(), vec![36]);
    assert_eq!(hs.deactivated_functions(0).unwrap().len(), 0);
    assert_eq!(hs.generation(), 0);
}

#[test]
fn two_refinement_steps() {
    let hs = refined_bicubic();
    assert_eq!(hs.numlevels(), 3);
    assert_eq!(hs.numactive(), vec![28, 21, 20]);
    let deact: Vec<usize> = (0..3)
        .map(|lv| hs.deactivated_functions(lv).unwrap().len())
        .collect();
    assert_eq!(deact, vec![8, 5, 0]);
    assert_eq!(hs.numdofs(), 28 + 21 + 20);
    assert_eq!(hs.generation(), 2);
    assert_eq!(hs.active_indices().iter().map(Vec::len).sum::<usize>(), hs.numdofs());
}

#[test]
fn thb_partition_of_unity_on_a_grid() {
    let hs = refined_bicubic();
    let r = hs.represent_fine(true).unwrap();
    assert_eq!((r.nrows(), r.ncols()), (225, 69));

    let coeffs = &r * &DVector::from_element(r.ncols(), 1.0);
    for v in grid_values(&hs, &coeffs, 10) {
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn active_cells_partition_the_domain() {
    let hs = refined_bicubic();
    assert_abs_diff_eq!(active_volume(&hs), 1.0, epsilon = 1e-12);
    assert_active_cells_disjoint(&hs);
}

#[test]
fn invalid_marks_leave_the_space_untouched() {
    let mut hs = refined_bicubic();
    // (0, 0) on level 0 was refined in the first step
    let err = hs.refine(&marked(0, &[[0, 0]]), false).unwrap_err();
    assert!(matches!(err, HSplineError::CellNotActive { level: 0, .. }));
    let err = hs.refine(&marked(7, &[[0, 0]]), false).unwrap_err();
    assert!(matches!(err, HSplineError::InvalidLevel { level: 7, .. }));
    assert_eq!(hs.numactive(), vec![28, 21, 20]);
    assert_eq!(hs.generation(), 2);
}
