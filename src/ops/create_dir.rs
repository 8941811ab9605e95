//! ops::create_dir
//!
//! Create a directory in a volume.
//!
//! # Steps
//!
//! 1. Leadership gate (redirect on followers)
//! 2. Decode and validate arguments; the caller needs a primary group
//! 3. Resolve the path and run the access checks in order (see
//!    [`crate::access`])
//! 4. Read the clock once
//! 5. Build the batch: new directory record, last-id record, parent record
//!    with fresh ctime/mtime
//!
//! The new record's key is also a commit-time precondition, so two racing
//! creations of the same name cannot both succeed.

use std::sync::Arc;

use serde::Deserialize;

use super::CREATE_DIRECTORY;
use crate::access::{resolve_in, AccessManager, AccessMode, PathResolver};
use crate::core::clock::Clock;
use crate::core::metadata::{
    encode_file_id, file_key, FileRecord, FILE_INDEX, LAST_FILE_ID_KEY, VOLUME_INDEX,
};
use crate::core::path::MetaPath;
use crate::core::types::{Errno, ProcedureId};
use crate::engine::{
    AtomicUpdate, Operation, OperationError, Prepared, RequestContext, Response, WriteGate,
};

/// Request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDirectoryArgs {
    pub volume_name: String,
    pub path: String,
    pub mode: u32,
}

/// `mkdir`.
pub struct CreateDirectory {
    gate: WriteGate,
    resolver: PathResolver,
    access: Arc<dyn AccessManager>,
    clock: Arc<dyn Clock>,
}

impl CreateDirectory {
    pub fn new(
        gate: WriteGate,
        resolver: PathResolver,
        access: Arc<dyn AccessManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gate,
            resolver,
            access,
            clock,
        }
    }
}

impl Operation for CreateDirectory {
    fn procedure_id(&self) -> ProcedureId {
        CREATE_DIRECTORY
    }

    fn name(&self) -> &'static str {
        "create_directory"
    }

    fn prepare(&self, ctx: &RequestContext) -> Result<Prepared, OperationError> {
        self.gate.check_writable()?;

        let args: CreateDirectoryArgs = ctx.decode()?;
        let user = &ctx.user;
        let owning_group = user.primary_group().ok_or_else(|| {
            OperationError::InvalidArgument(format!("user '{}' has no group", user.user_id))
        })?;

        let path = MetaPath::new(&args.volume_name, &args.path)?;
        let volume = self.resolver.volume(path.volume())?;
        let res = resolve_in(volume, &path)?;

        let parent = res.parent().ok_or_else(|| {
            OperationError::posix(
                Errno::Eexist,
                format!("file or directory '{}' exists already", res.file_name()),
            )
        })?;

        self.access.check_search_permission(&res, user)?;
        self.access
            .check_permission(AccessMode::Write, parent, parent.parent_id, user)?;
        res.check_if_file_exists_already()?;

        let time = self.clock.now_secs();
        let mut update = AtomicUpdate::new(
            Arc::clone(volume.engine()),
            Box::new(move |_, _| Ok(Response::Timestamp { timestamp_s: time })),
        );

        let file_id = volume.next_file_id();
        let record = FileRecord::directory(
            file_id,
            parent.id,
            res.file_name(),
            time,
            user.user_id.as_str(),
            owning_group,
            args.mode,
        );
        let key = file_key(parent.id, res.file_name());
        update.expect_absent(FILE_INDEX, key.clone());
        update.add_put(FILE_INDEX, key, record.encode()?);

        update.add_put(
            VOLUME_INDEX,
            LAST_FILE_ID_KEY.to_vec(),
            encode_file_id(file_id),
        );

        let mut parent_record = parent.clone();
        parent_record.times.ctime = time;
        parent_record.times.mtime = time;
        update.add_put(
            FILE_INDEX,
            file_key(parent_record.parent_id, &parent_record.name),
            parent_record.encode()?,
        );

        tracing::debug!(
            volume = volume.name(),
            path = %path,
            file_id = %file_id,
            "prepared directory creation"
        );

        Ok(Prepared::Update(update))
    }
}
