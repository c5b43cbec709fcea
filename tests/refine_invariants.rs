mod util;

use nalgebra_sparse::CsrMatrix;
use proptest::prelude::*;
use thb_splines::prelude::*;
use util::*;

fn max_abs(m: &CsrMatrix<f64>) -> f64 {
    m.values().iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

/// Run `steps` random refinements: each step picks a level and marks the
/// active cells whose position in the sorted active set has its bit set.
fn random_space(p: usize, n: usize, disparity: Option<usize>, steps: &[(usize, u64)]) -> HSpace<2> {
    let mut options = HSpaceOptions::default();
    if let Some(d) = disparity {
        options = options.with_disparity(d);
    }
    let mut hs = uniform_space_with::<2>(p, n, options);
    for &(lv, mask) in steps {
        let lv = lv.min(hs.numlevels() - 1);
        let cells: IndexSet<2> = hs
            .active_cells(lv)
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << (i % 64)) != 0)
            .map(|(_, c)| *c)
            .collect();
        if cells.is_empty() {
            continue;
        }
        hs.refine(&LevelSets::from([(lv, cells)]), false).unwrap();
    }
    hs
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn refinement_keeps_space_consistent(
        p in 1usize..=3,
        n in 2usize..=4,
        graded in any::<bool>(),
        steps in prop::collection::vec((0usize..3, any::<u64>()), 1..4),
    ) {
        let disparity = graded.then_some(1);
        let hs = random_space(p, n, disparity, &steps);

        prop_assert!((active_volume(&hs) - 1.0).abs() < 1e-9);
        assert_active_cells_disjoint(&hs);
        if graded {
            prop_assert!(max_level_gap(&hs) <= 1);
        }

        let thb = hs.represent_fine(true).unwrap();
        prop_assert_eq!(thb.ncols(), hs.numdofs());
        let ones = &thb * &nalgebra::DVector::from_element(thb.ncols(), 1.0);
        prop_assert!(ones.iter().all(|v| (v - 1.0).abs() < 1e-10));

        let hb = hs.represent_fine(false).unwrap();
        let t = hs.thb_to_hb().unwrap();
        prop_assert!(max_abs(&(&(&hb * &t) - &thb)) < 1e-10);
        let identity: CsrMatrix<f64> = CsrMatrix::identity(hs.numdofs());
        prop_assert!(max_abs(&(&(&hs.hb_to_thb().unwrap() * &t) - &identity)) < 1e-10);
    }

    #[test]
    fn generation_counts_refinements(steps in prop::collection::vec((0usize..2, 1u64..), 1..5)) {
        let mut hs = uniform_space::<2>(2, 3);
        let mut expected = 0;
        for (lv, mask) in steps {
            let lv = lv.min(hs.numlevels() - 1);
            let cells: IndexSet<2> = hs
                .active_cells(lv)
                .unwrap()
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << (i % 64)) != 0)
                .map(|(_, c)| *c)
                .collect();
            if cells.is_empty() {
                continue;
            }
            hs.refine(&LevelSets::from([(lv, cells)]), false).unwrap();
            expected += 1;
            prop_assert_eq!(hs.generation(), expected);
        }
    }
}
