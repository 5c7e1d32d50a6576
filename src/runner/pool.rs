//! Bounded worker pool for one batch.

use std::thread;

/// Run `work` for every id in `batch` on at most `workers` threads.
///
/// Ids are queued in the order given. Returns once every id has been
/// processed, with results in the order of `batch`. With a single worker,
/// or a single id, the batch runs inline on the calling thread.
pub fn run_batch<T, F>(batch: &[String], workers: usize, work: F) -> Vec<(String, T)>
where
    T: Send,
    F: Fn(&str) -> T + Sync,
{
    let workers = workers.clamp(1, batch.len().max(1));
    if workers == 1 {
        return batch.iter().map(|id| (id.clone(), work(id.as_str()))).collect();
    }

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &str)>();
    for job in batch.iter().map(String::as_str).enumerate() {
        if job_tx.send(job).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, T)>();
    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let work = &work;
            scope.spawn(move || {
                for (index, id) in job_rx.iter() {
                    if done_tx.send((index, work(id))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(done_tx);

    let mut done: Vec<(usize, T)> = done_rx.iter().collect();
    done.sort_by_key(|(index, _)| *index);
    done.into_iter()
        .map(|(index, result)| (batch[index].clone(), result))
        .collect()
}
