//! Atomic command execution
//!
//! `apply()` is the entry point front ends use to mutate an instrument.
//!
//! ## Atomicity Contract
//!
//! - **All-or-nothing**: the command runs on a working copy which replaces the
//!   caller's instrument only on success
//! - **No panics**: invalid input returns typed errors
//! - **Scoped events**: the outcome carries exactly the change events the
//!   command produced
//!
//! ## Example
//!
//! ```
//! use nexcon_core::{apply, Command, Instrument};
//!
//! let mut instrument = Instrument::new();
//! let outcome = apply(
//!     &mut instrument,
//!     Command::CreateComponent {
//!         name: "detector".to_string(),
//!         nx_class: "NXdetector".to_string(),
//!         description: String::new(),
//!     },
//! )
//! .unwrap();
//! assert_eq!(outcome.path, "/entry/instrument/detector");
//! ```

use std::time::Instant;

use crate::commands::{Command, CommandOutcome};
use crate::errors::Result;
use crate::logging_facility::elapsed_ms;
use crate::model::{Component, Transform};
use crate::ops::Instrument;
use crate::{log_op_end, log_op_error, log_op_start};

/// Apply a command to an instrument
///
/// If this returns `Err`, `instrument` is exactly as it was before the call,
/// including its dependency registry and pending events.
///
/// # Errors
///
/// Any error of the underlying operation: lookup failures for unknown paths,
/// `NotOwner`, `HasDependents`, `ZeroLengthVector`, `CycleDetected`, ...
pub fn apply(instrument: &mut Instrument, cmd: Command) -> Result<CommandOutcome> {
    let start = Instant::now();
    let op = cmd.op_name();
    log_op_start!("apply", command = op);

    let mut working = instrument.clone();
    let already_pending = working.store().pending_events().len();

    match execute(&mut working, cmd) {
        Ok(path) => {
            let events = working.store().pending_events()[already_pending..].to_vec();
            *instrument = working;
            log_op_end!(
                "apply",
                duration_ms = elapsed_ms(start),
                command = op,
                events = events.len()
            );
            Ok(CommandOutcome { path, events })
        }
        Err(e) => {
            log_op_error!("apply", &e, duration_ms = elapsed_ms(start), command = op);
            Err(e)
        }
    }
}

/// Run the command, returning the path of the affected entity
fn execute(inst: &mut Instrument, cmd: Command) -> Result<String> {
    match cmd {
        Command::CreateComponent {
            name,
            nx_class,
            description,
        } => {
            let component = inst.create_component(&name, &nx_class, &description)?;
            component.absolute_path(inst)
        }

        Command::RemoveComponent { component } => {
            let c = inst.component_at(&component)?;
            inst.remove_component(c)?;
            Ok(component)
        }

        Command::RenameComponent { component, name } => {
            let c = inst.component_at(&component)?;
            c.set_name(inst, &name)?;
            c.absolute_path(inst)
        }

        Command::SetDescription {
            component,
            description,
        } => {
            let c = inst.component_at(&component)?;
            c.set_description(inst, &description)?;
            Ok(component)
        }

        Command::AddTranslation {
            component,
            vector,
            units,
            name,
            depends_on,
        } => {
            let c = inst.component_at(&component)?;
            let target = resolve_target(inst, depends_on.as_deref())?;
            let t = match units {
                Some(units) => {
                    c.add_translation_with_units(inst, vector, &units, name.as_deref(), target)?
                }
                None => c.add_translation(inst, vector, name.as_deref(), target)?,
            };
            t.absolute_path(inst)
        }

        Command::AddRotation {
            component,
            axis,
            angle,
            name,
            depends_on,
        } => {
            let c = inst.component_at(&component)?;
            let target = resolve_target(inst, depends_on.as_deref())?;
            let t = c.add_rotation(inst, axis, angle, name.as_deref(), target)?;
            t.absolute_path(inst)
        }

        Command::RemoveTransformation {
            component,
            transform,
        } => {
            let c = inst.component_at(&component)?;
            let t = inst.transform_at(&transform)?;
            c.remove_transformation(inst, t)?;
            Ok(transform)
        }

        Command::RenameTransform { transform, name } => {
            let t = inst.transform_at(&transform)?;
            t.set_name(inst, &name)?;
            t.absolute_path(inst)
        }

        Command::SetComponentDependsOn { component, target } => {
            let c: Component = inst.component_at(&component)?;
            let target = resolve_target(inst, target.as_deref())?;
            c.set_depends_on(inst, target)?;
            Ok(component)
        }

        Command::SetTransformDependsOn { transform, target } => {
            let t = inst.transform_at(&transform)?;
            let target = resolve_target(inst, target.as_deref())?;
            t.set_depends_on(inst, target)?;
            Ok(transform)
        }

        Command::AddStream {
            parent,
            name,
            fields,
        } => {
            let group = inst.create_stream_group(&parent, &name, &fields)?;
            inst.store().absolute_path(group)
        }

        Command::AddLink {
            parent,
            name,
            target,
        } => {
            let group = inst.create_link(&parent, &name, &target)?;
            inst.store().absolute_path(group)
        }
    }
}

/// `None` and `"."` both mean the origin
fn resolve_target(inst: &Instrument, path: Option<&str>) -> Result<Option<Transform>> {
    match path {
        None | Some(crate::store::ORIGIN_SENTINEL) => Ok(None),
        Some(path) => inst.transform_at(path).map(Some),
    }
}
