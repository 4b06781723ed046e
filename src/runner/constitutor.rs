//! Post-definition tasks, run once per class after loading finishes and after the parent's.

use tracing::{trace, warn};

use crate::runner::ds::class::{ClassRef, Constitutor};
use crate::runner::ds::error::ClassError;
use crate::runner::runtime::Runtime;

impl Runtime {
    /// Registers `task` on `class`.
    ///
    /// A waiting class parks the task until its parent resolves. Once loading has started the
    /// task is queued, or run on the spot if the class has already constituted.
    pub fn constitute(&mut self, class: &ClassRef, task: Constitutor) -> Result<(), ClassError> {
        if class.is_waiting() {
            class.with_waiting(|w| w.constitute.push(task));
            return Ok(());
        }

        class.push_constitutor(task.clone());

        if self.is_loaded() || self.is_loading() {
            if class.is_constituted() {
                return self.do_constructor_task(class, &task);
            }
            let class = class.clone();
            self.queue_immediate(move |rt| rt.do_constructor_task(&class, &task));
        }
        Ok(())
    }

    /// Runs every task of `class` that has not run yet, then the classes waiting on it.
    /// Does nothing the second time it is called for a class.
    pub fn do_constitutors(&mut self, class: &ClassRef) -> Result<(), ClassError> {
        if !class.mark_constituted() {
            return Ok(());
        }
        trace!(class = %class.path(), "constituting");
        for task in class.constitutors() {
            self.do_constructor_task(class, &task)?;
        }
        for child in class.waiting_children() {
            self.do_constitutors(&child)?;
        }
        Ok(())
    }

    /// Runs `task` for `class` unless it already ran. It is only recorded after it succeeds.
    pub(crate) fn do_constructor_task(
        &mut self,
        class: &ClassRef,
        task: &Constitutor,
    ) -> Result<(), ClassError> {
        if class.has_finished(task) {
            return Ok(());
        }
        trace!(class = %class.path(), task = task.name(), "running constitutor");
        if let Err(e) = task.run(self, class) {
            warn!(class = %class.path(), task = task.name(), error = %e, "constitutor failed");
            return Err(e);
        }
        class.mark_finished(task.clone());
        Ok(())
    }
}
