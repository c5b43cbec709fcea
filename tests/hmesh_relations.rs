mod util;

use thb_splines::prelude::*;
use util::*;

fn three_level_mesh() -> HMesh<2> {
    let mut hs = uniform_space::<2>(2, 3);
    hs.refine(&marked(0, &[[0, 0], [1, 1], [2, 0]]), false).unwrap();
    hs.refine(&marked(1, &[[0, 0], [3, 2]]), false).unwrap();
    hs.hmesh().clone()
}

#[test]
fn cell_parent_inverts_children() {
    let hm = three_level_mesh();
    let cells: IndexSet<2> = [[0, 2], [1, 0], [2, 2]].into_iter().collect();
    let children = hm.cell_children(0, &cells).unwrap();
    assert_eq!(children.len(), 4 * cells.len());
    assert_eq!(hm.cell_parent(1, &children).unwrap(), cells);

    let grandchildren = hm.cell_grandchildren(0, &cells, 2).unwrap();
    assert_eq!(grandchildren.len(), 16 * cells.len());
    assert_eq!(hm.cell_grandparent(2, &grandchildren, 0).unwrap(), cells);
}

#[test]
fn function_parents_cover_the_functions() {
    let hm = three_level_mesh();
    let funcs: IndexSet<2> = [[0, 0], [2, 3], [4, 1]].into_iter().collect();
    let children = hm.function_children(0, &funcs).unwrap();
    assert!(funcs.is_subset(&hm.function_parents(1, &children).unwrap()));

    let grandchildren = hm.function_grandchildren(0, &funcs, 2).unwrap();
    assert_eq!(grandchildren, hm.function_children(1, &children).unwrap());
    assert!(funcs.is_subset(&hm.function_grandparents(2, &grandchildren, 0).unwrap()));
}

#[test]
fn function_children_lie_in_parent_support() {
    let hm = three_level_mesh();
    let coarse = hm.mesh(0).unwrap();
    let fine = hm.mesh(1).unwrap();
    for f in coarse.functions() {
        let parent_cells = coarse.support([&f]).unwrap();
        let children = hm.function_children(0, [&f]).unwrap();
        let child_cells = fine.support(&children).unwrap();
        assert_eq!(hm.cell_parent(1, &child_cells).unwrap(), parent_cells);
    }
}

#[test]
fn level_preconditions() {
    let hm = three_level_mesh();
    let cells: IndexSet<2> = [[0, 0]].into_iter().collect();
    assert!(matches!(
        hm.cell_children(2, &cells),
        Err(HSplineError::InvalidLevel { level: 2, .. })
    ));
    assert!(matches!(
        hm.cell_parent(0, &cells),
        Err(HSplineError::InvalidLevel { level: 0, .. })
    ));
    assert!(matches!(
        hm.cell_grandchildren(1, &cells, 1),
        Err(HSplineError::InvalidTargetLevel { level: 1, target: 1 })
    ));
    assert!(matches!(
        hm.function_grandparents(1, &cells, 1),
        Err(HSplineError::InvalidTargetLevel { level: 1, target: 1 })
    ));
}

#[test]
fn virtual_mesh_replays_coarse_refinements() {
    let hm = three_level_mesh();
    let vm = hm.virtual_mesh(1).unwrap();
    assert_eq!(vm.numlevels(), 2);
    assert_eq!(vm.active(0).unwrap(), hm.active(0).unwrap());
    let represented: IndexSet<2> = hm
        .active(1)
        .unwrap()
        .union(hm.deactivated(1).unwrap())
        .copied()
        .collect();
    assert_eq!(vm.active(1).unwrap(), &represented);
    assert!(vm.deactivated(1).unwrap().is_empty());
}

#[test]
fn hmesh_cells_lifts_deactivated_cells_to_active_descendants() {
    let hm = three_level_mesh();
    // (0, 0) on level 0 is deactivated; its level 1 child (0, 0) is too
    let wanted = LevelSets::from([(0, [[0, 0]].into_iter().collect::<IndexSet<2>>())]);
    let cells = hm.hmesh_cells(&wanted).unwrap();
    let covered: usize = cells
        .iter()
        .map(|(&lv, c)| c.len() * 4usize.pow(2 - lv as u32))
        .sum();
    // the 16 level 2 cells below (0, 0)
    assert_eq!(covered, 16);
    for (&lv, c) in &cells {
        assert!(c.is_subset(hm.active(lv).unwrap()));
    }
}
