use crate::resource::{Discipline, WaitQueue};
use crate::sim::SimTime;

fn drain<T: Copy>(q: &mut WaitQueue<T>) -> Vec<T> {
    std::iter::from_fn(|| q.pop().map(|w| w.item)).collect()
}

#[test]
fn head_insert_goes_first_within_its_class() {
    let mut q = WaitQueue::new(Discipline::Priority);
    q.push('a', 1, SimTime::ZERO).expect("push");
    q.push('b', 0, SimTime::ZERO).expect("push");
    q.push_front('c', 1, SimTime::ZERO);
    q.push_front('d', 1, SimTime::ZERO);
    assert_eq!(drain(&mut q), vec!['b', 'd', 'c', 'a']);
}

#[test]
fn fifo_and_manual_ignore_priority() {
    for d in [Discipline::Fifo, Discipline::Manual] {
        let mut q = WaitQueue::new(d);
        q.push(1, 5, SimTime::ZERO).expect("push");
        q.push(2, -5, SimTime::ZERO).expect("push");
        q.push_front(0, 9, SimTime::ZERO);
        assert_eq!(drain(&mut q), vec![0, 1, 2], "{d:?}");
    }
}

#[test]
fn bounded_line_hands_back_the_overflow() {
    let mut q = WaitQueue::with_capacity(Discipline::Fifo, 1);
    assert_eq!(q.capacity(), 1);
    q.push("x", 0, SimTime(1.0)).expect("push");
    assert_eq!(q.push("y", 0, SimTime(2.0)), Err("y"));
    assert!(q.is_full());
    assert_eq!(q.peek().map(|w| w.entered), Some(SimTime(1.0)));
}

#[test]
fn remove_by_takes_the_first_match_in_service_order() {
    let mut q = WaitQueue::new(Discipline::Priority);
    q.push(10, 3, SimTime::ZERO).expect("push");
    q.push(11, 1, SimTime::ZERO).expect("push");
    q.push(12, 1, SimTime::ZERO).expect("push");
    let w = q.remove_by(|v| v % 2 == 0).expect("match");
    assert_eq!((w.item, w.priority), (12, 1));
    assert_eq!(q.len(), 2);
    assert_eq!(q.clear().into_iter().map(|w| w.item).collect::<Vec<_>>(), vec![11, 10]);
    assert!(q.is_empty());
}

#[test]
fn push_unbounded_ignores_the_limit() {
    let mut q = WaitQueue::with_capacity(Discipline::Fifo, 1);
    q.push('a', 0, SimTime::ZERO).expect("push");
    q.push_unbounded('b', 0, SimTime::ZERO);
    assert!(q.is_full());
    assert_eq!(q.len(), 2);
    assert_eq!(drain(&mut q), vec!['a', 'b']);
}

#[test]
fn reprioritize_moves_an_entry_to_the_back_of_its_new_class() {
    let mut q = WaitQueue::new(Discipline::Priority);
    q.push('a', 0, SimTime(1.0)).expect("push");
    q.push('b', 2, SimTime(2.0)).expect("push");
    q.push('c', 2, SimTime(3.0)).expect("push");

    assert!(q.reprioritize(|&v| v == 'a', 2));
    assert!(!q.reprioritize(|&v| v == 'z', 0));
    let entries: Vec<(char, i32, SimTime)> =
        q.iter().map(|w| (w.item, w.priority, w.entered)).collect();
    assert_eq!(
        entries,
        vec![('b', 2, SimTime(2.0)), ('c', 2, SimTime(3.0)), ('a', 2, SimTime(1.0))]
    );
}
