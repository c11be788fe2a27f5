use crate::{
    api::{attendance, department, employee, geocode, job_role, site, work_assignment},
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
    let per_ms = (60_000 / u64::from(requests_per_min.max(1))).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        // only None for a zero period or burst, both clamped above
        .expect("rate limiter config is non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
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
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(web::resource("/users").route(web::post().to(handlers::register)))
            .service(web::resource("/geocode").route(web::get().to(geocode::reverse_geocode)))
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/check-out").route(web::post().to(attendance::check_out)))
                    .service(web::resource("/summary").route(web::get().to(attendance::summary)))
                    .service(
                        web::resource("/status").route(web::put().to(attendance::override_status)),
                    )
                    .service(
                        web::resource("/{record_id}/address")
                            .route(web::put().to(attendance::update_address)),
                    ),
            )
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/sites")
                    .service(
                        web::resource("")
                            .route(web::post().to(site::create_site))
                            .route(web::get().to(site::list_sites)),
                    )
                    .service(
                        web::resource("/{site_id}")
                            .route(web::put().to(site::update_site))
                            .route(web::get().to(site::get_site))
                            .route(web::delete().to(site::delete_site)),
                    ),
            )
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::post().to(department::create_department))
                            .route(web::get().to(department::list_departments)),
                    )
                    .service(
                        web::resource("/{department_id}")
                            .route(web::put().to(department::update_department))
                            .route(web::get().to(department::get_department))
                            .route(web::delete().to(department::delete_department)),
                    ),
            )
            .service(
                web::scope("/job-roles")
                    .service(
                        web::resource("")
                            .route(web::post().to(job_role::create_job_role))
                            .route(web::get().to(job_role::list_job_roles)),
                    )
                    // before /{job_role_id} so POST /assign is not a 405
                    .service(
                        web::resource("/assign").route(web::post().to(job_role::assign_job_role)),
                    )
                    .service(
                        web::resource("/{job_role_id}")
                            .route(web::put().to(job_role::update_job_role))
                            .route(web::get().to(job_role::get_job_role))
                            .route(web::delete().to(job_role::delete_job_role)),
                    ),
            )
            .service(
                web::scope("/work-assignments")
                    .service(
                        web::resource("")
                            .route(web::post().to(work_assignment::create_assignment))
                            .route(web::get().to(work_assignment::list_assignments)),
                    )
                    .service(
                        web::resource("/employee/{employee_id}")
                            .route(web::get().to(work_assignment::employee_assignments)),
                    )
                    .service(
                        web::resource("/{assignment_id}")
                            .route(web::put().to(work_assignment::update_assignment))
                            .route(web::get().to(work_assignment::get_assignment))
                            .route(web::delete().to(work_assignment::delete_assignment)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new token pair, old refresh token revoked
