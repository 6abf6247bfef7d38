use crate::{
    api::{
        attendance, broadcast, employee, expense, gps_attendance, holiday, leave_request,
        notification, overtime, payroll, site, task,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-route limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes. Static segments are registered before `{id}` ones.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .route("/me", web::get().to(handlers::me))
            .service(
                web::scope("/employee")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .route("/me", web::get().to(employee::my_profile))
                    .route("/departments", web::get().to(employee::departments))
                    .route("/designations", web::get().to(employee::designations))
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .route(
                        "/{employee_id}/credentials",
                        web::post().to(employee::create_credentials),
                    ),
            )
            .service(
                web::scope("/sites")
                    .service(
                        web::resource("")
                            .route(web::post().to(site::create_site))
                            .route(web::get().to(site::list_sites)),
                    )
                    .route("/active", web::get().to(site::active_sites))
                    .route("/nearby", web::get().to(site::nearby_sites))
                    .route("/my", web::get().to(site::my_sites))
                    .route("/code/{site_code}", web::get().to(site::get_site_by_code))
                    .route("/employee/{employee_id}", web::get().to(site::employee_sites))
                    .route("/assignments", web::post().to(site::assign_employee))
                    .route(
                        "/assignments/employee/{employee_id}",
                        web::get().to(site::employee_assignments),
                    )
                    .route(
                        "/assignments/{assignment_id}",
                        web::delete().to(site::remove_assignment),
                    )
                    .service(
                        web::resource("/{site_id}")
                            .route(web::get().to(site::get_site))
                            .route(web::put().to(site::update_site))
                            .route(web::delete().to(site::delete_site)),
                    )
                    .route("/{site_id}/employees", web::get().to(site::site_employees)),
            )
            .service(
                web::scope("/gps-attendance")
                    .route("/mark", web::post().to(gps_attendance::mark))
                    .route("/sync", web::post().to(gps_attendance::sync_offline))
                    .route("/my", web::get().to(gps_attendance::my_logs))
                    .route("/map", web::get().to(gps_attendance::map_logs))
                    .route("/logs", web::get().to(gps_attendance::logs_in_range))
                    .route("/summary", web::get().to(gps_attendance::punch_summary))
                    .route(
                        "/employee/{employee_id}",
                        web::get().to(gps_attendance::employee_logs),
                    )
                    .route("/site/{site_id}", web::get().to(gps_attendance::site_logs)),
            )
            .service(
                web::scope("/attendance")
                    .route("/my", web::get().to(attendance::my_attendance))
                    .route("/my/today", web::get().to(attendance::my_today))
                    .route("/date", web::get().to(attendance::attendance_for_date))
                    .route("/mark-absent", web::post().to(attendance::mark_absent))
                    .route("/bulk-mark-absent", web::post().to(attendance::bulk_mark_absent))
                    .route("/mark-manual", web::post().to(attendance::mark_manual))
                    .route("/punch-time", web::put().to(attendance::correct_punch))
                    .route("/daily/summary", web::get().to(attendance::daily_summary))
                    .route(
                        "/today/{employee_id}",
                        web::get().to(attendance::today_for_employee),
                    )
                    .route(
                        "/employee/{employee_id}/absent",
                        web::post().to(attendance::mark_employee_absent),
                    )
                    .route(
                        "/employee/{employee_id}",
                        web::get().to(attendance::employee_attendance),
                    )
                    .route(
                        "/{attendance_id}/recompute",
                        web::post().to(attendance::recompute_hours),
                    )
                    .route("/{attendance_id}/status", web::put().to(attendance::update_status)),
            )
            .service(
                web::scope("/holidays")
                    .route("", web::post().to(holiday::create_holiday))
                    .route("/active", web::get().to(holiday::active_holidays))
                    .route("/range", web::get().to(holiday::holidays_in_range))
                    .route("/date/{date}", web::get().to(holiday::holiday_by_date))
                    .service(
                        web::resource("/{holiday_id}")
                            .route(web::get().to(holiday::get_holiday))
                            .route(web::put().to(holiday::update_holiday))
                            .route(web::delete().to(holiday::delete_holiday)),
                    ),
            )
            .service(
                web::scope("/leaves")
                    .service(
                        web::resource("")
                            .route(web::post().to(leave_request::apply_leave))
                            .route(web::get().to(leave_request::list_leaves)),
                    )
                    .route("/my", web::get().to(leave_request::my_leaves))
                    .route(
                        "/responsibilities",
                        web::get().to(leave_request::my_responsibilities),
                    )
                    .service(
                        web::resource("/{leave_id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::put().to(leave_request::update_leave))
                            .route(web::delete().to(leave_request::delete_leave)),
                    )
                    .route("/{leave_id}/review", web::put().to(leave_request::review_leave)),
            )
            .service(
                web::scope("/overtimes")
                    .service(
                        web::resource("")
                            .route(web::post().to(overtime::apply_overtime))
                            .route(web::get().to(overtime::list_overtimes)),
                    )
                    .route("/my", web::get().to(overtime::my_overtimes))
                    .service(
                        web::resource("/{overtime_id}")
                            .route(web::get().to(overtime::get_overtime))
                            .route(web::put().to(overtime::update_overtime))
                            .route(web::delete().to(overtime::delete_overtime)),
                    )
                    .route("/{overtime_id}/review", web::put().to(overtime::review_overtime)),
            )
            .service(
                web::scope("/expenses")
                    .service(
                        web::resource("")
                            .route(web::post().to(expense::apply_expense))
                            .route(web::get().to(expense::list_expenses)),
                    )
                    .route("/my", web::get().to(expense::my_expenses))
                    .service(
                        web::resource("/{expense_id}")
                            .route(web::get().to(expense::get_expense))
                            .route(web::put().to(expense::update_expense))
                            .route(web::delete().to(expense::delete_expense)),
                    )
                    .route("/{expense_id}/review", web::put().to(expense::review_expense)),
            )
            .service(
                web::scope("/tasks")
                    .service(
                        web::resource("")
                            .route(web::post().to(task::assign_task))
                            .route(web::get().to(task::list_tasks)),
                    )
                    .route("/my", web::get().to(task::my_tasks))
                    .service(
                        web::resource("/{task_id}")
                            .route(web::get().to(task::get_task))
                            .route(web::put().to(task::update_task))
                            .route(web::delete().to(task::delete_task)),
                    )
                    .route("/{task_id}/review", web::put().to(task::review_task)),
            )
            .service(
                web::scope("/salary-slips")
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::generate_slip))
                            .route(web::get().to(payroll::list_slips)),
                    )
                    .route("/calculate", web::post().to(payroll::calculate_salary))
                    .route("/bulk", web::post().to(payroll::generate_bulk))
                    .route("/my", web::get().to(payroll::my_slips))
                    .route(
                        "/employee/{employee_id}/period",
                        web::get().to(payroll::slip_for_period),
                    )
                    .route("/employee/{employee_id}", web::get().to(payroll::employee_slips))
                    .service(
                        web::resource("/{slip_id}")
                            .route(web::get().to(payroll::get_slip))
                            .route(web::delete().to(payroll::delete_slip)),
                    )
                    .route("/{slip_id}/finalize", web::put().to(payroll::finalize_slip))
                    .route("/{slip_id}/status", web::put().to(payroll::update_slip_status)),
            )
            .service(
                web::scope("/broadcasts")
                    .service(
                        web::resource("")
                            .route(web::post().to(broadcast::create_broadcast))
                            .route(web::get().to(broadcast::list_broadcasts)),
                    )
                    .route("/active", web::get().to(broadcast::active_broadcasts))
                    .service(
                        web::resource("/{broadcast_id}")
                            .route(web::get().to(broadcast::get_broadcast))
                            .route(web::put().to(broadcast::update_broadcast))
                            .route(web::delete().to(broadcast::delete_broadcast)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .route("", web::get().to(notification::my_notifications))
                    .route("/unread", web::get().to(notification::unread_notifications))
                    .route("/unread/count", web::get().to(notification::unread_count))
                    .route("/read-all", web::put().to(notification::mark_all_read))
                    .service(
                        web::resource("/push-token")
                            .route(web::post().to(notification::register_push_token))
                            .route(web::delete().to(notification::remove_push_token)),
                    )
                    .route("/{notification_id}", web::delete().to(notification::delete_notification))
                    .route("/{notification_id}/read", web::put().to(notification::mark_read)),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL, rotated on refresh)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new token pair
