use super::*;

#[test]
fn column_names_round_trip() {
    for column in Column::ALL {
        assert_eq!(Column::from_name(column.as_str()), Some(column));
    }
    assert_eq!(Column::from_name("password"), None);
}

#[test]
fn select_query_builder_accumulates_filters_in_order() {
    let query = SelectQuery::all()
        .eq(Column::Location, "Lab A")
        .gte(Column::Capacity, 25)
        .order_by(Column::Location);

    assert_eq!(
        query.filters,
        vec![
            Filter::Eq(Column::Location, FilterValue::Text("Lab A".into())),
            Filter::Gte(Column::Capacity, 25),
        ]
    );
    assert_eq!(query.order_by, Some(Column::Location));
}
