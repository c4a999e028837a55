// Tables read back through the Diesel DSL. Writes go through dynamic SQL
// because their column set follows the configured record shape.

diesel::table! {
    runs (id) {
        id -> Integer,
        date -> Text,
        time -> Text,
        cusip -> Text,
        dealer -> Text,
        security -> Nullable<Text>,
        benchmark -> Nullable<Text>,
        bid_spread -> Nullable<Double>,
        ask_spread -> Nullable<Double>,
        bid_size -> Nullable<Double>,
        ask_size -> Nullable<Double>,
        bid_price -> Nullable<Double>,
        ask_price -> Nullable<Double>,
    }
}

diesel::table! {
    g_spread (id) {
        id -> Integer,
        date -> Text,
        cusip -> Text,
        security -> Text,
        #[sql_name = "g_spread"]
        spread_value -> Nullable<Double>,
    }
}
