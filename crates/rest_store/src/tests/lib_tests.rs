use super::*;

#[test]
fn table_endpoint_appends_rest_prefix() {
    let url = table_endpoint("https://demo.supabase.co", "lab_schedule").expect("url");
    assert_eq!(url.as_str(), "https://demo.supabase.co/rest/v1/lab_schedule");
}

#[test]
fn table_endpoint_keeps_base_path_segments() {
    let url = table_endpoint("http://127.0.0.1:9000/proxy", "lab_schedule").expect("url");
    assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/rest/v1/lab_schedule");
}

#[test]
fn table_endpoint_rejects_garbage() {
    assert!(table_endpoint("not a url", "lab_schedule").is_err());
}

#[test]
fn select_params_use_postgrest_operators() {
    let query = SelectQuery::all()
        .eq(Column::Day, "Monday")
        .gte(Column::Capacity, 25)
        .order_by(Column::Location);
    assert_eq!(
        select_params(&query),
        vec![
            ("select", "*".to_string()),
            ("day", "eq.Monday".to_string()),
            ("capacity", "gte.25".to_string()),
            ("order", "location.asc,id.asc".to_string()),
        ]
    );
}

#[test]
fn unordered_select_falls_back_to_id_order() {
    let params = select_params(&SelectQuery::all().eq(Column::Id, 7));
    assert_eq!(params[1], ("id", "eq.7".to_string()));
    assert_eq!(params[2], ("order", "id.asc".to_string()));
}
