diesel::table! {
    submissions (sequence_id) {
        sequence_id -> Integer,
        judge -> Text,
        problem_id -> Text,
        title -> Text,
        url -> Text,
        submit_time -> Text,
        origin_timezone -> Text,
    }
}

diesel::table! {
    watermarks (row_id) {
        row_id -> Integer,
        consumer_name -> Text,
        submission_sequence_id -> Integer,
        updated_at -> Text,
    }
}

diesel::table! {
    credentials (row_id) {
        row_id -> Integer,
        site -> Text,
        user_token -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(watermarks -> submissions (submission_sequence_id));

diesel::allow_tables_to_appear_in_same_query!(submissions, watermarks, credentials);
