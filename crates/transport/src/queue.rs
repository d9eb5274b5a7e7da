use crossbeam_channel::{Receiver, Sender};
use regsync_kernel::RegistryDirectory;
use std::thread::JoinHandle;

/// Work marshalled onto the simulation context.
pub type Task = Box<dyn FnOnce(&mut RegistryDirectory) + Send + 'static>;

#[derive(Debug, thiserror::Error)]
#[error("simulation context is no longer accepting tasks")]
pub struct ScheduleError;

/// Cloneable sender side of the simulation task queue.
#[derive(Clone)]
pub struct SimulationHandle {
    tx: Sender<Task>,
}

impl std::fmt::Debug for SimulationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationHandle")
            .field("queued", &self.tx.len())
            .finish()
    }
}

impl SimulationHandle {
    /// Queue a task. Fails once the queue has been dropped.
    pub fn schedule<F>(&self, task: F) -> Result<(), ScheduleError>
    where
        F: FnOnce(&mut RegistryDirectory) + Send + 'static,
    {
        self.tx.send(Box::new(task)).map_err(|_| ScheduleError)
    }
}

/// Receiving side, owned by whoever owns the live registries.
pub struct SimulationQueue {
    rx: Receiver<Task>,
}

impl SimulationQueue {
    pub fn new() -> (Self, SimulationHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { rx }, SimulationHandle { tx })
    }

    /// Run every task queued so far. Meant to be called from the owner's tick.
    pub fn run_pending(&self, directory: &mut RegistryDirectory) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(directory);
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(ran, "simulation tasks drained");
        }
        ran
    }

    /// Serve tasks until every handle is dropped.
    pub fn run_until_closed(&self, directory: &mut RegistryDirectory) {
        for task in self.rx.iter() {
            task(directory);
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Move `directory` onto a dedicated simulation thread.
///
/// The thread returns the directory once every handle is dropped.
pub fn spawn_simulation(
    mut directory: RegistryDirectory,
) -> std::io::Result<(SimulationHandle, JoinHandle<RegistryDirectory>)> {
    let (queue, handle) = SimulationQueue::new();
    let thread = std::thread::Builder::new()
        .name("simulation".into())
        .spawn(move || {
            tracing::debug!("simulation context started");
            queue.run_until_closed(&mut directory);
            tracing::debug!("simulation context stopped");
            directory
        })?;
    Ok((handle, thread))
}
