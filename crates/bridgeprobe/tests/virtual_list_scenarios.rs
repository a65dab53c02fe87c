//! Virtualized list scenarios against a simulated container.

use bridgeprobe::prelude::*;
use bridgeprobe::testing::SimulatedList;
use std::sync::Arc;

fn probe(list: SimulatedList) -> (Arc<SimulatedList>, VirtualListProbe) {
    let list = Arc::new(list);
    let probe = VirtualListProbe::new(list.clone(), ProbeOptions::new("#file-tree"));
    (list, probe)
}

#[tokio::test]
async fn window_indices_stay_ordered_and_bounded() {
    let (_, probe) = probe(SimulatedList::new(1_000, 24.0, 480.0));
    for index in [0, 137, 512, 999] {
        assert!(
            probe
                .scroll_to_index(index, ScrollOptions::default())
                .await
                .unwrap()
        );
        let state = probe.state().await.unwrap();
        assert!(state.start_index <= state.end_index);
        assert!(state.end_index < state.total_count);
        assert!(state.rendered_count <= state.total_count);
        assert!(state.contains_index(index));
    }
}

#[tokio::test]
async fn count_marker_beats_the_height_estimate() {
    let (_, probe) = probe(SimulatedList::new(250, 30.0, 300.0).with_total_marker());
    let state = probe.state().await.unwrap();
    assert_eq!(state.total_count, 250);
    assert!(!state.total_count_estimated);
    state.assert_item_count(250).unwrap();
}

#[tokio::test]
async fn selection_is_read_from_markers() {
    let (_, probe) = probe(SimulatedList::new(50, 20.0, 200.0).with_selected(&[3]));
    let state = probe.state().await.unwrap();
    state.assert_item_selected("Item 3").unwrap();
    assert!(state.assert_item_selected("Item 4").is_err());
}

#[tokio::test(start_paused = true)]
async fn search_walks_the_list_until_the_item_is_visible() {
    let (list, probe) = probe(SimulatedList::new(400, 32.0, 320.0));
    let item = probe
        .scroll_to_item("Item 250", SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(item.index, 250);
    assert!(item.visible);
    assert!(list.scroll_top() > 0.0);

    let top = probe.scroll_to_top().await.unwrap();
    assert_eq!(top.start_index, 0);
    let bottom = probe.scroll_to_bottom().await.unwrap();
    assert_eq!(bottom.end_index, 399);
}

#[tokio::test(start_paused = true)]
async fn search_walks_a_list_marked_only_by_role() {
    let (list, probe) = probe(SimulatedList::new(200, 40.0, 400.0).without_indices());
    let item = probe
        .scroll_to_item("Item 150", SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(item.text, "Item 150");
    assert!(list.scroll_top() > 5_000.0);
}

#[tokio::test(start_paused = true)]
async fn stuck_list_never_errors_on_scroll_to_index() {
    let (_, probe) = probe(SimulatedList::new(10_000, 40.0, 400.0).frozen());
    let reached = probe
        .scroll_to_index(9_000, ScrollOptions::default().with_timeout(250))
        .await
        .unwrap();
    assert!(!reached);
}

#[tokio::test]
async fn missing_container_is_not_found() {
    let (_, probe) = probe(SimulatedList::new(10, 40.0, 400.0).without_container());
    assert!(probe.state().await.unwrap_err().is_not_found());
    let err = probe
        .measure_scroll_performance(MeasureOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn janky_scroll_fails_thresholds() {
    let mut frames = vec![16.0; 90];
    frames.extend([50.0, 60.0, 70.0, 80.0, 90.0]);
    let (_, probe) = probe(SimulatedList::new(2_000, 24.0, 480.0).with_frames(frames));

    let sample = probe
        .measure_scroll_performance(MeasureOptions {
            scroll_distance: 3_000.0,
            duration_ms: 1_500,
        })
        .await
        .unwrap();

    assert_eq!(sample.dropped_frames, 5);
    assert!((sample.distance - 3_000.0).abs() < 1e-9);
    assert!(sample
        .assert_scroll_performance(&ScrollThresholds::new().with_max_dropped_frames(2))
        .is_err());
    sample
        .assert_scroll_performance(&ScrollThresholds::new().with_max_dropped_frames(5))
        .unwrap();
}
