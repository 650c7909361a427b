//! Diesel schema for task and history persistence.

diesel::table! {
    /// User accounts owned by the authentication subsystem.
    users (id) {
        /// User identifier.
        id -> Int8,
        /// Login name.
        #[max_length = 150]
        username -> Varchar,
    }
}

diesel::table! {
    /// Current task state.
    tasks (id) {
        /// Task identifier.
        id -> Int8,
        /// Task name.
        #[max_length = 255]
        name -> Varchar,
        /// Optional free-text description.
        description -> Nullable<Text>,
        /// Status code.
        #[max_length = 20]
        status -> Varchar,
        /// Optional assignee.
        assigned_to -> Nullable<Int8>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only field-level change log.
    task_history (id) {
        /// Entry identifier.
        id -> Int8,
        /// Live task reference, nulled when the task is deleted.
        task_id -> Nullable<Int8>,
        /// Task identifier copy kept after deletion.
        task_id_snapshot -> Nullable<Int8>,
        /// Acting user reference.
        changed_by -> Nullable<Int8>,
        /// Acting user name at change time.
        #[max_length = 150]
        changed_by_username -> Nullable<Varchar>,
        /// Recording timestamp.
        #[sql_name = "timestamp"]
        recorded_at -> Timestamptz,
        /// Changed field name.
        #[max_length = 255]
        field -> Varchar,
        /// Serialised value before the change.
        old_value -> Nullable<Text>,
        /// Serialised value after the change.
        new_value -> Nullable<Text>,
    }
}
