diesel::table! {
    tickets (id) {
        id -> Uuid,
        ticket_number -> Varchar,
        domain -> Varchar,
        subject -> Varchar,
        description -> Nullable<Text>,
        status -> Varchar,
        priority -> Varchar,
        requester_id -> Uuid,
        requester_name -> Varchar,
        assigned_to -> Nullable<Uuid>,
        due_date -> Nullable<Timestamptz>,
        denial_reason -> Nullable<Text>,
        version -> Int4,
        resolved_at -> Nullable<Timestamptz>,
        closed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_approvals (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        approval_level -> Int4,
        approval_role -> Varchar,
        status -> Varchar,
        notes -> Nullable<Text>,
        decided_by -> Nullable<Uuid>,
        decided_at -> Nullable<Timestamptz>,
        version -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_history (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        action -> Varchar,
        old_value -> Nullable<Varchar>,
        new_value -> Nullable<Varchar>,
        actor_id -> Uuid,
        actor_name -> Varchar,
        metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_comments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        author_id -> Uuid,
        author_name -> Varchar,
        content -> Text,
        is_internal -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_quotations (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        supplier_name -> Varchar,
        amount -> Numeric,
        notes -> Nullable<Text>,
        is_selected -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    uniform_items (id) {
        id -> Uuid,
        name -> Varchar,
        size -> Varchar,
        current_stock -> Int4,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    hr_details (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        rh_type -> Varchar,
        uniform_item_id -> Nullable<Uuid>,
        quantity -> Nullable<Int4>,
    }
}

diesel::table! {
    claim_details (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        policy_number -> Varchar,
        incident_date -> Date,
        claimed_amount -> Nullable<Numeric>,
    }
}

diesel::joinable!(ticket_approvals -> tickets (ticket_id));
diesel::joinable!(ticket_history -> tickets (ticket_id));
diesel::joinable!(ticket_comments -> tickets (ticket_id));
diesel::joinable!(ticket_quotations -> tickets (ticket_id));
diesel::joinable!(hr_details -> tickets (ticket_id));
diesel::joinable!(hr_details -> uniform_items (uniform_item_id));
diesel::joinable!(claim_details -> tickets (ticket_id));

diesel::allow_tables_to_appear_in_same_query!(
    tickets,
    ticket_approvals,
    ticket_history,
    ticket_comments,
    ticket_quotations,
    uniform_items,
    hr_details,
    claim_details,
);
