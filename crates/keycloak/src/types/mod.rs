pub mod requests;
pub mod responses;

pub use requests::{
    ChangePasswordRequest, ClientRequest, IntrospectQuery, LoginRequest, RefreshTokenRequest,
    RegisterRequest, ResetPasswordRequest, TokenRequest, UpdateUserProfileRequest, UserPage,
};
pub use responses::{
    ClientResponse, ClientSecret, IntrospectionResponse, RoleRepresentation, TokenResponse,
    UserProfileResponse, UserRepresentation,
};
