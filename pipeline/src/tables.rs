//! Static catalog of raw datasets and derived reporting tables.
//!
//! Table and schema names here are a persisted contract: downstream
//! consumers query `staging` and `analytics` by these exact names.

pub const RAW_SCHEMA: &str = "public";
pub const STAGING_SCHEMA: &str = "staging";
pub const ANALYTICS_SCHEMA: &str = "analytics";

/// Raw CSV datasets loaded on every run. The destination table name is the
/// file stem, always landing in `public` first.
pub const DATASETS: [&str; 6] = [
    "company_profiles_google_maps.csv",
    "customer_reviews_google.csv",
    "fmcsa_companies.csv",
    "fmcsa_company_snapshot.csv",
    "fmcsa_complaints.csv",
    "fmcsa_safer_data.csv",
];

/// One derived reporting table: destination, upstream tables, and the fixed
/// query that defines its content. The query text is static, never generated.
pub struct DerivedTable {
    pub name: &'static str,
    pub schema: &'static str,
    /// Tables the query reads: dataset stems (normalized in `staging`) or
    /// other derived table names.
    pub reads: &'static [&'static str],
    pub sql: &'static str,
}

pub fn derived_tables() -> &'static [DerivedTable] {
    &DERIVED_TABLES
}

pub fn derived_table(name: &str) -> Option<&'static DerivedTable> {
    DERIVED_TABLES.iter().find(|table| table.name == name)
}

pub fn dataset_stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

pub fn is_dataset_stem(name: &str) -> bool {
    DATASETS.iter().any(|file| dataset_stem(file) == name)
}

static DERIVED_TABLES: [DerivedTable; 6] = [
    DerivedTable {
        name: "transformed_fmcsa_companies",
        schema: STAGING_SCHEMA,
        reads: &["fmcsa_companies", "fmcsa_company_snapshot", "fmcsa_safer_data"],
        sql: r#"
        select
            fmcsa_companies.usdot_num as company_id,
            fmcsa_companies.company_name,
            fmcsa_companies.city as company_city,
            fmcsa_companies.state as company_state,
            fmcsa_companies.location as company_location,
            fmcsa_company_snapshot.hhg_authorization,
            fmcsa_company_snapshot.num_of_trucks,
            fmcsa_company_snapshot.num_of_tractors,
            fmcsa_company_snapshot.num_of_trailers,
            fmcsa_safer_data.drivers,
            fmcsa_safer_data.entity_type,
            fmcsa_safer_data.operating_status,
            fmcsa_safer_data.operation_classification,
            fmcsa_safer_data.carrier_type,
            fmcsa_safer_data.mileage,
            fmcsa_safer_data.mileage_year,
            fmcsa_safer_data.oos_date
        from staging.fmcsa_companies
        left join staging.fmcsa_company_snapshot
            on fmcsa_companies.usdot_num = fmcsa_company_snapshot.usdot_num
        left join staging.fmcsa_safer_data
            on fmcsa_companies.usdot_num = fmcsa_safer_data.usdot_num
        "#,
    },
    DerivedTable {
        name: "transformed_google_maps_companies",
        schema: STAGING_SCHEMA,
        reads: &["company_profiles_google_maps"],
        sql: r#"
        select
            google_id as company_id,
            name as company_name,
            site as company_site,
            "type" as company_type,
            subtypes as company_subtypes,
            verified as company_verified,
            business_status,
            phone as company_phone,
            full_address as company_full_address,
            city as company_city,
            state as company_state,
            city || ', ' || state as company_location,
            working_hours_old_format as working_hours,
            latitude,
            longitude,
            time_zone,
            rating as overall_rating,
            reviews_link,
            street_view as street_view_link,
            owner_id,
            owner_title as owner_name,
            owner_link,
            reviews as reviews_amount
        from staging.company_profiles_google_maps
        "#,
    },
    DerivedTable {
        name: "fmcsa_companies",
        schema: ANALYTICS_SCHEMA,
        reads: &["transformed_fmcsa_companies"],
        sql: "select * from staging.transformed_fmcsa_companies",
    },
    DerivedTable {
        name: "fmcsa_companies_complaints",
        schema: ANALYTICS_SCHEMA,
        reads: &["transformed_fmcsa_companies", "fmcsa_complaints"],
        sql: r#"
        select
            id as complaint_id,
            company_id,
            complaint_year,
            complaint_count,
            complaint_category,
            oos_date,
            date_created as complaint_date
        from staging.transformed_fmcsa_companies tfc
        join staging.fmcsa_complaints fc on tfc.company_id = fc.usdot_num
        "#,
    },
    DerivedTable {
        name: "google_maps_companies",
        schema: ANALYTICS_SCHEMA,
        reads: &["transformed_google_maps_companies"],
        sql: "select * from staging.transformed_google_maps_companies",
    },
    DerivedTable {
        name: "google_maps_companies_reviews",
        schema: ANALYTICS_SCHEMA,
        reads: &["customer_reviews_google", "transformed_google_maps_companies"],
        sql: r#"
        select
            review_id,
            google_id as company_id,
            author_id,
            author_title as author_name,
            author_link,
            author_reviews_count,
            review_rating,
            review_likes,
            review_link,
            review_text,
            owner_answer,
            review_datetime_utc as review_date,
            owner_answer_timestamp_datetime_utc as owner_answer_date
        from staging.customer_reviews_google
        "#,
    },
];
