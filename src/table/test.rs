use super::columns::*;
use super::filter::*;
use super::footer::*;
use super::frame::*;
use super::pagination::*;
use super::sort::*;
use super::tableview::*;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Frame with a low-cardinality key, a noisy number column and a label
fn make_frame(rng: &mut StdRng, rows: usize) -> DataFrame {
    let keys: Vec<f64> = (0..rows).map(|_| rng.gen_range(0..5) as f64).collect();
    let values: Vec<f64> = (0..rows)
        .map(|_| if rng.gen_bool(0.1) { f64::NAN } else { rng.gen_range(-100.0..100.0) })
        .collect();
    let labels: Vec<String> = (0..rows).map(|_| ["alpha", "Beta", "gamma", "DELTA"][rng.gen_range(0..4)].to_string()).collect();
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    DataFrame::new(vec![
        Field::numbers("key", &keys),
        Field::numbers("value", &values),
        Field::strings("label", &labels),
    ])
}

fn key_state() -> SortState {
    SortState::from_keys(vec![
        SortKey { column: "key".to_string(), direction: SortDirection::Ascending },
        SortKey { column: "label".to_string(), direction: SortDirection::Descending },
    ])
}

fn columns_of(frame: &DataFrame) -> Vec<ColumnDescriptor> {
    build_columns(frame, &ColumnLayout::default(), &ColumnWidths::new())
}

#[test]
fn sort_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    let frame = make_frame(&mut rng, 500);
    let rows: Vec<usize> = (0..500).collect();
    let once = sort_rows(&rows, &key_state(), &frame);
    let twice = sort_rows(&once, &key_state(), &frame);
    assert_eq!(once, twice);
}

#[test]
fn sort_is_stable_on_equal_keys() {
    let mut rng = StdRng::seed_from_u64(11);
    let frame = make_frame(&mut rng, 400);
    let rows: Vec<usize> = (0..400).collect();
    let sorted = sort_rows(&rows, &SortState::single("key", SortDirection::Ascending), &frame);

    // within one key, rows keep their input order
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if frame.fields[0].value(a) == frame.fields[0].value(b) {
            assert!(a < b);
        }
    }
}

#[test]
fn sort_result_is_a_permutation() {
    let mut rng = StdRng::seed_from_u64(3);
    let frame = make_frame(&mut rng, 300);
    let mut rows: Vec<usize> = (0..300).collect();
    rows.shuffle(&mut rng);
    let mut sorted = sort_rows(&rows, &key_state(), &frame);
    sorted.sort_unstable();
    assert_eq!(sorted, (0..300).collect::<Vec<_>>());
}

#[test]
fn nan_values_cluster_last_in_both_directions() {
    let mut rng = StdRng::seed_from_u64(5);
    let frame = make_frame(&mut rng, 200);
    let rows: Vec<usize> = (0..200).collect();
    for direction in [SortDirection::Ascending, SortDirection::Descending] {
        let sorted = sort_rows(&rows, &SortState::single("value", direction), &frame);
        let first_nan = sorted.iter()
            .position(|&r| frame.fields[1].value(r).is_null())
            .unwrap_or(sorted.len());
        assert!(sorted[first_nan..].iter().all(|&r| frame.fields[1].value(r).is_null()));
    }
}

#[test]
fn filter_is_idempotent_and_order_preserving() {
    let mut rng = StdRng::seed_from_u64(13);
    let frame = make_frame(&mut rng, 500);
    let mut rows: Vec<usize> = (0..500).collect();
    rows.shuffle(&mut rng);

    let mut state = FilterState::new();
    state.set("key", ColumnFilter::from_values(&[Value::Number(1.0), Value::Number(3.0)]));
    let once = filter_rows(&rows, &state, &frame);
    let twice = filter_rows(&once, &state, &frame);
    assert_eq!(once, twice);

    let positions: Vec<usize> = once.iter()
        .map(|r| rows.iter().position(|x| x == r).unwrap())
        .collect();
    assert!(positions.windows(2).all(|p| p[0] < p[1]));
}

#[test]
fn filter_then_sort_matches_sort_then_filter() {
    let mut rng = StdRng::seed_from_u64(17);
    let frame = make_frame(&mut rng, 500);
    let rows: Vec<usize> = (0..500).collect();
    let mut state = FilterState::new();
    state.set("label", ColumnFilter::from_values(&[Value::from("alpha"), Value::from("DELTA")]));

    let a = sort_rows(&filter_rows(&rows, &state, &frame), &key_state(), &frame);
    let b = filter_rows(&sort_rows(&rows, &key_state(), &frame), &state, &frame);
    assert_eq!(a, b);
}

#[test]
fn footer_is_invariant_under_row_order() {
    let mut rng = StdRng::seed_from_u64(19);
    let frame = make_frame(&mut rng, 300);
    let columns = columns_of(&frame);
    let options = FooterOptions { reducers: vec![Reducer::Sum, Reducer::Count, Reducer::Min], ..FooterOptions::default() };

    let rows: Vec<usize> = (0..300).collect();
    let mut shuffled = rows.clone();
    shuffled.shuffle(&mut rng);

    let sum_of = |items: &[FooterItem]| match &items[1] {
        FooterItem::Values(values) => values.iter().map(|v| (v.reducer, v.value)).collect::<Vec<_>>(),
        other => panic!("unexpected footer item {other:?}"),
    };
    let a = aggregate(&rows, &options, &frame, &columns);
    let b = aggregate(&shuffled, &options, &frame, &columns);
    for ((ra, va), (rb, vb)) in sum_of(&a).into_iter().zip(sum_of(&b)) {
        assert_eq!(ra, rb);
        assert!((va - vb).abs() < 1e-9);
    }
}

#[test]
fn pagination_slices_cover_every_row_once() {
    let rows: Vec<usize> = (0..103).collect();
    let mut pagination = Pagination::new(true);
    pagination.set_page_size(10, rows.len());
    let mut seen = Vec::new();
    for page in 0..pagination.page_count(rows.len()) {
        pagination.set_page(page, rows.len());
        seen.extend_from_slice(pagination.slice(&rows));
    }
    assert_eq!(seen, rows);
}

#[test]
fn view_pipeline_matches_pure_transforms() {
    let mut rng = StdRng::seed_from_u64(23);
    let frame = make_frame(&mut rng, 1_000);
    let all: Vec<usize> = (0..1_000).collect();

    let mut view = TableView::new(ViewOptions::default());
    view.set_container_size(800.0, 600.0);
    view.set_data(frame.clone());
    view.set_filter("key", ColumnFilter::from_values(&[Value::Number(0.0), Value::Number(4.0)]));
    view.set_sort(key_state());

    let expected = sort_rows(&filter_rows(&all, view.filter_state(), &frame), &key_state(), &frame);
    assert_eq!(view.ordered_rows(), expected.as_slice());

    let snapshot = view.snapshot();
    assert_eq!(snapshot.state, GridState::Rows);
    let shown: Vec<usize> = snapshot.rows.iter().map(|r| r.row).collect();
    assert_eq!(shown.as_slice(), &expected[..shown.len()]);
}

#[test]
fn expansion_follows_rows_through_shuffled_sorts() {
    let mut rng = StdRng::seed_from_u64(29);
    let sub = DataFrame::new(vec![Field::numbers("x", &[1.0])]);
    let rows = 50;
    let values: Vec<f64> = (0..rows).map(|_| rng.gen_range(0.0..10.0)).collect();
    let nested: Vec<Vec<DataFrame>> = (0..rows)
        .map(|i| if i % 7 == 0 { vec![sub.clone()] } else { Vec::new() })
        .collect();
    let frame = DataFrame::new(vec![Field::numbers("v", &values), Field::nested("nested", nested)]);

    let mut view = TableView::new(ViewOptions::default());
    view.set_container_size(800.0, 100_000.0);
    view.set_data(frame);
    assert!(view.toggle_expanded(14));

    for _ in 0..5 {
        let multi = rng.gen_bool(0.5);
        view.toggle_sort("v", multi);
        let snapshot = view.snapshot();
        for row in &snapshot.rows {
            assert_eq!(row.expanded, row.row == 14);
        }
    }
}
