//! Esquema Diesel (escrito a mano, equivalente a `diesel print-schema`).

diesel::table! {
    domain_records (canonical_key) {
        canonical_key -> Text,
        label -> Text,
        attributes -> Jsonb,
        sync_hash -> Text,
        active -> Bool,
        created_at -> Timestamptz,
        last_synced_at -> Timestamptz,
    }
}

diesel::table! {
    sync_runs (run_id) {
        run_id -> Uuid,
        source -> Text,
        state -> Text,
        counts -> Jsonb,
        applied -> BigInt,
        errors -> Jsonb,
        warnings -> Jsonb,
        report -> Jsonb,
        started_at -> Timestamptz,
        finished_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(domain_records, sync_runs,);
