diesel::table! {
    cooldowns (guild_id, user_id) {
        guild_id -> Text,
        user_id -> Text,
        last_created_at -> BigInt,
    }
}

diesel::table! {
    guild_config (guild_id) {
        guild_id -> Text,
        enabled -> Bool,
        category_id -> Nullable<Text>,
        creator_channel_id -> Nullable<Text>,
        panel_channel_id -> Nullable<Text>,
        panel_message_id -> Nullable<Text>,
        log_channel_id -> Nullable<Text>,
        name_template -> Text,
        brand_color -> Text,
        cooldown_seconds -> Integer,
        delete_delay_seconds -> Integer,
        claim_timeout_seconds -> Integer,
        max_rooms_per_user -> Integer,
    }
}

diesel::table! {
    rooms (room_id) {
        room_id -> Text,
        guild_id -> Text,
        side_channel_id -> Text,
        owner_id -> Text,
        created_at -> BigInt,
        last_owner_seen_at -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(cooldowns, guild_config, rooms);
