diesel::table! {
    relationships (sender_id, receiver_id, relationship_type) {
        sender_id -> Varchar,
        receiver_id -> Varchar,
        #[sql_name = "type"]
        relationship_type -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Varchar,
        email -> Text,
        username -> Nullable<Text>,
        created_at -> Timestamptz,
        last_login_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    relationships,
    users,
);
