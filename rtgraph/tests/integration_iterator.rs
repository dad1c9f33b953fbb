//! Integration tests for iterator movement and interpolated reads.

use rtgraph::error::{IteratorError, RtgError};
use rtgraph::{Channel, InterpolationMode};

fn sine_channel(points: u32) -> Channel {
    let mut channel = Channel::new("sine", "s", "V");
    for i in 0..points {
        let x = f64::from(i) * 0.1;
        channel.add_value(x, x.sin()).unwrap();
    }
    channel
}

#[test]
fn test_walk_forward_visits_every_sample() {
    let channel = sine_channel(100);
    let mut iter = channel.make_iterator();

    let mut visited = 1;
    while iter.step_by_samples(1).unwrap() {
        visited += 1;
    }
    assert_eq!(visited, 100);
    assert!(!iter.is_valid());
}

#[test]
fn test_walk_backward_from_newest() {
    let channel = sine_channel(10);
    let mut iter = channel.make_iterator();
    iter.seek_last();

    let mut xs = vec![iter.x().unwrap()];
    while iter.step_by_samples(-1).unwrap() {
        xs.push(iter.x().unwrap());
    }
    assert_eq!(xs.len(), 10);
    assert!(xs.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn test_step_by_x_strides() {
    let channel = sine_channel(100);
    let mut iter = channel.make_iterator();

    let mut landed = vec![iter.x().unwrap()];
    while iter.step_by_x(1.0).unwrap() {
        landed.push(iter.x().unwrap());
    }

    // Lands on the first sample at or after each 1.0 stride
    assert!((9..=10).contains(&landed.len()), "{landed:?}");
    for pair in landed.windows(2) {
        assert!(pair[1] - pair[0] >= 1.0 - 1e-9);
        assert!(pair[1] - pair[0] < 1.1 + 1e-9);
    }
}

#[test]
fn test_invalid_iterator_fails_every_read_and_step() {
    let channel = sine_channel(5);
    let mut iter = channel.make_iterator();
    iter.seek_before(0.0);
    assert!(!iter.is_valid());

    assert!(matches!(
        iter.read_value(),
        Err(RtgError::Iterator(IteratorError::Invalid))
    ));
    assert!(iter.step_by_samples(1).is_err());
    assert!(iter.step_by_x(0.5).is_err());

    // Seeking recovers
    assert!(iter.seek_at(0.2));
    assert!(iter.read_value().is_ok());
}

#[test]
fn test_past_the_end_holds_last_value_in_every_mode() {
    let mut channel = sine_channel(20);
    let last = channel.pyramid().raw().last().copied().unwrap();

    for mode in InterpolationMode::ALL {
        channel.set_interpolation(mode);
        let mut iter = channel.make_iterator();
        assert!(iter.seek_at(1_000.0));
        assert_eq!(iter.read_value().unwrap(), last.y, "{mode}");
    }
}

#[test]
fn test_smooth_tracks_curve_better_than_linear() {
    let mut channel = sine_channel(64);

    let error_for = |channel: &Channel| {
        let mut iter = channel.make_iterator();
        let mut worst: f64 = 0.0;
        for i in 10..50 {
            let x = f64::from(i) * 0.1 + 0.05;
            iter.seek_at(x);
            worst = worst.max((iter.read_value().unwrap() - x.sin()).abs());
        }
        worst
    };

    channel.set_interpolation(InterpolationMode::Linear);
    let linear = error_for(&channel);
    channel.set_interpolation(InterpolationMode::Smooth);
    let smooth = error_for(&channel);

    assert!(smooth < linear, "smooth {smooth} vs linear {linear}");
}

#[test]
fn test_iterator_after_eviction() {
    let mut channel = sine_channel(100);
    channel.set_max_samples(10).unwrap();

    let mut iter = channel.make_iterator();
    assert!(iter.is_valid());
    assert!((iter.x().unwrap() - 9.0).abs() < 1e-9);

    // Positions before the retained data are no longer reachable
    assert!(!iter.seek_at(5.0));
    assert!(iter.seek_nearest(5.0));
    assert!((iter.x().unwrap() - 9.0).abs() < 1e-9);
}

#[test]
fn test_samples_range_matches_iterator_walk() {
    let channel = sine_channel(50);

    let from_range: Vec<f64> = channel.samples(1.0, 2.0).unwrap().map(|s| s.x).collect();

    let mut iter = channel.make_iterator();
    iter.seek_at(1.0 - 1e-9);
    iter.step_by_samples(1).unwrap();
    let mut from_iter = Vec::new();
    while let Some(x) = iter.x().filter(|&x| x <= 2.0 + 1e-9) {
        from_iter.push(x);
        if !iter.step_by_samples(1).unwrap() {
            break;
        }
    }

    assert_eq!(from_range.len(), from_iter.len());
}
