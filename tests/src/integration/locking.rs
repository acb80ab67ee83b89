//! # Locking Integration
//!
//! Shared and exclusive tokens on one data object, held from several
//! threads at once.
//!
//! ```text
//! reader 1 ──shared──┐
//! reader 2 ──shared──┼──► object ◄──exclusive── writer (waits for both)
//! ```

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use cd_06_data_lock::{downcast, Data, DataObject, LockError, LockMode};
    use serde_json::json;

    use crate::integration::support::{num, Num};

    const PATIENCE: Duration = Duration::from_secs(2);

    /// Holds a shared token until told to release it.
    fn reader(
        object: Arc<Data<Num>>,
        acquired: mpsc::Sender<i64>,
        release: mpsc::Receiver<()>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let token = object.lock_shared().unwrap();
            acquired.send(token.0).unwrap();
            release.recv().unwrap();
            drop(token);
        })
    }

    // =========================================================================
    // SHARED AND EXCLUSIVE
    // =========================================================================

    #[test]
    fn test_exclusive_waits_for_both_shared_holders() {
        let object = Data::new("o", Num(7));
        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (release_1, wait_1) = mpsc::channel();
        let (release_2, wait_2) = mpsc::channel();

        let first = reader(object.clone(), acquired_tx.clone(), wait_1);
        let second = reader(object.clone(), acquired_tx, wait_2);

        // both shared tokens are granted without either being released
        assert_eq!(acquired_rx.recv_timeout(PATIENCE).unwrap(), 7);
        assert_eq!(acquired_rx.recv_timeout(PATIENCE).unwrap(), 7);

        let writes = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let object = object.clone();
            let writes = writes.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut token = object.lock_exclusive().unwrap();
                token.0 += 1;
                writes.fetch_add(1, Ordering::SeqCst);
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst), "writer ran while readers held the object");

        release_1.send(()).unwrap();
        first.join().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!done.load(Ordering::SeqCst), "writer ran while one reader still held the object");

        release_2.send(()).unwrap();
        second.join().unwrap();
        writer.join().unwrap();

        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert_eq!(object.lock_shared().unwrap().0, 8);
    }

    #[test]
    fn test_bounded_exclusive_attempt_times_out() {
        let object = Data::new("o", Num(0));
        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (release, wait) = mpsc::channel();
        let holder = reader(object.clone(), acquired_tx, wait);
        acquired_rx.recv_timeout(PATIENCE).unwrap();

        let err = object.try_lock_exclusive_for(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, LockError::Timeout { mode: LockMode::Exclusive, .. }));
        // shared access is still available next to the holder
        assert!(object.try_lock_shared_for(Duration::from_millis(30)).is_ok());

        release.send(()).unwrap();
        holder.join().unwrap();
        assert!(object.try_lock_exclusive_for(Duration::from_millis(30)).is_ok());
    }

    #[test]
    fn test_downgrade_lets_readers_in() {
        let object = Data::new("o", Num(1));
        let mut token = object.lock_exclusive().unwrap();
        token.0 = 2;
        let shared = token.downgrade();
        assert_eq!(shared.mode(), LockMode::Shared);

        let reader = {
            let object = object.clone();
            thread::spawn(move || object.lock_shared().unwrap().0)
        };
        assert_eq!(reader.join().unwrap(), 2);
        drop(shared);
    }

    // =========================================================================
    // ERASED OBJECTS
    // =========================================================================

    #[test]
    fn test_erased_access_goes_through_the_same_lock() {
        let object = num("o", 3);
        assert_eq!(object.snapshot().unwrap(), json!(3));
        object.assign(&json!(9), None).unwrap();

        let typed = downcast::<Num>(&object).unwrap();
        assert_eq!(typed.lock_shared().unwrap().0, 9);

        // a held exclusive token blocks erased readers on other threads
        let token = typed.lock_exclusive().unwrap();
        let (tx, rx) = mpsc::channel();
        let erased = object.clone();
        let reader = thread::spawn(move || tx.send(erased.snapshot().unwrap()).unwrap());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        drop(token);
        assert_eq!(rx.recv_timeout(PATIENCE).unwrap(), json!(9));
        reader.join().unwrap();
    }

    #[test]
    fn test_rejected_assignment_leaves_value() {
        let object = num("o", 4);
        assert!(matches!(
            object.assign(&json!("four"), None),
            Err(LockError::Unsupported { .. })
        ));
        assert_eq!(object.snapshot().unwrap(), json!(4));
    }

    #[tokio::test]
    async fn test_blocking_writer_from_async_context() {
        let object = Data::new("o", Num(0));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let object = object.clone();
                tokio::task::spawn_blocking(move || {
                    let mut token = object.lock_exclusive().unwrap();
                    token.0 += 1;
                })
            })
            .collect();
        for task in tasks {
            tokio::time::timeout(PATIENCE, task).await.unwrap().unwrap();
        }
        assert_eq!(object.lock_shared().unwrap().0, 8);
    }
}
