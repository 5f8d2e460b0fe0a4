use tsframe::core::clock::{generate, ClockSpec};
use tsframe::{Error, RangeSplit};

#[test]
fn clock_scenario_two_partitions() {
    let clock = generate(0, 10, 3, 0, 2).expect("generate");
    assert_eq!(clock.num_partitions(), 2);

    let splits: Vec<_> = clock.splits().cloned().collect();
    assert!(splits[0].adjacent(&splits[1]));
    assert_eq!(splits[0], RangeSplit::bounded(0, 6).expect("split"));
    assert_eq!(splits[1], RangeSplit::unbounded(6));

    let ticks: Vec<i64> = clock.to_global_sequence().map(|(t, _)| t).collect();
    assert_eq!(ticks, vec![0, 3, 6, 9]);
}

#[test]
fn clock_rejects_bad_parameters() {
    assert!(matches!(
        generate(5, 1, 1, 0, 1),
        Err(Error::InvalidRange { .. })
    ));
    assert!(matches!(
        generate(0, 1, 5, 10, 1),
        Err(Error::EmptyClock { .. })
    ));
    assert!(matches!(
        generate(0, 100, 0, 0, 1),
        Err(Error::InvalidFrequency(0))
    ));
}

#[test]
fn clock_partitions_cover_range_without_gaps() {
    let cases = [
        (0, 10, 3, 0, 2),
        (0, 0, 1, 0, 1),
        (0, 1_000, 1, 0, 7),
        (-50, 50, 7, 3, 4),
        (10, 20, 100, 5, 3),
        (0, 99, 10, -1, 17),
        (1_000, 1_000_000, 997, 12_345, 64),
        (0, 5, 1, 0, 100),
    ];
    for (begin, end, frequency, offset, partitions) in cases {
        let spec = ClockSpec::new(begin, end, frequency)
            .with_offset(offset)
            .with_partitions(partitions);
        let first_tick = spec.first_tick().expect("first tick");
        let clock = spec.generate().expect("generate");

        assert!(clock.num_partitions() >= 1);
        assert!(clock.num_partitions() <= partitions);

        let splits: Vec<_> = clock.splits().cloned().collect();
        assert_eq!(*splits[0].begin(), first_tick);
        assert!(splits.last().expect("last split").is_unbounded());
        for pair in splits.windows(2) {
            assert!(pair[0].adjacent(&pair[1]), "{:?}", spec);
        }

        let expected: Vec<i64> = std::iter::successors(Some(first_tick), |t| Some(t + frequency))
            .take_while(|t| *t <= end)
            .collect();
        let mut seen = Vec::new();
        for partition in clock.partitions() {
            let ticks: Vec<i64> = partition.rows().map(|(t, _)| t).collect();
            assert!(!ticks.is_empty(), "empty partition for {:?}", spec);
            for tick in &ticks {
                assert!(partition.split().contains(tick));
            }
            seen.extend(ticks);
        }
        assert_eq!(seen, expected, "{:?}", spec);
    }
}

#[test]
fn clock_partitions_are_balanced() {
    let clock = ClockSpec::new(0, 99, 1)
        .with_partitions(4)
        .generate()
        .expect("generate");
    let sizes: Vec<usize> = clock.partitions().iter().map(|p| p.rows().count()).collect();
    assert_eq!(sizes, vec![25, 25, 25, 25]);
}

#[test]
fn clock_values_equal_keys() {
    let clock = generate(0, 20, 5, 0, 2).expect("generate");
    assert!(clock.to_global_sequence().all(|(key, value)| key == value));
}
