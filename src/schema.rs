// Diesel table definitions. Kept in sync with repository/schema_sqlite.sql.

diesel::table! {
    categories (id) {
        id -> Integer,
        nota_id -> Text,
        description -> Text,
    }
}

diesel::table! {
    localities (id) {
        id -> Integer,
        geohash -> Text,
        name -> Text,
    }
}

diesel::table! {
    queries (id) {
        id -> Integer,
        term -> Text,
        radius -> Double,
        category_id -> Integer,
    }
}

diesel::table! {
    query_localities (query_id, local_id) {
        query_id -> Integer,
        local_id -> Integer,
        position -> Integer,
    }
}

diesel::table! {
    spreadsheets (id) {
        id -> Integer,
        google_id -> Text,
        query_id -> Nullable<Integer>,
        is_populated -> Bool,
        last_populated -> Nullable<Text>,
    }
}

diesel::joinable!(queries -> categories (category_id));
diesel::joinable!(query_localities -> queries (query_id));
diesel::joinable!(query_localities -> localities (local_id));
diesel::joinable!(spreadsheets -> queries (query_id));

diesel::allow_tables_to_appear_in_same_query!(
    categories,
    localities,
    queries,
    query_localities,
    spreadsheets,
);
